//! Python bindings

use crate::core::height_range;
use crate::core::topo_removal;
use crate::io::dem::{ElevationModelRegistry, RasterElevationModel};
use crate::types::GeoTransform;
use numpy::{PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Remove a phase screen from an interferogram given as real/imaginary arrays
#[pyfunction]
fn subtract_topo_phase(
    py: Python,
    real: PyReadonlyArray2<f32>,
    imag: PyReadonlyArray2<f32>,
    phase: PyReadonlyArray2<f64>,
) -> PyResult<PyObject> {
    let real = real.as_array().to_owned();
    let imag = imag.as_array().to_owned();
    let phase = phase.as_array().to_owned();

    let (corrected_real, corrected_imag) = topo_removal::subtract_topo_phase(&real, &imag, &phase)
        .map_err(|e| PyValueError::new_err(format!("Phase removal failed: {}", e)))?;

    let result = PyDict::new(py);
    result.set_item("real", corrected_real.to_pyarray(py))?;
    result.set_item("imag", corrected_imag.to_pyarray(py))?;
    Ok(result.into())
}

/// Height bounds of a DEM array, sampled the way DEM tiles are sized
#[pyfunction]
#[pyo3(signature = (dem, no_data_value, extension_percent = 100))]
fn estimate_height_range(
    py: Python,
    dem: PyReadonlyArray2<f32>,
    no_data_value: f64,
    extension_percent: u32,
) -> PyResult<PyObject> {
    let data = dem.as_array().to_owned();
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return Err(PyValueError::new_err("DEM array is empty"));
    }

    // index space is all that matters for the estimate
    let transform = GeoTransform {
        top_left_x: 0.0,
        pixel_width: 1.0,
        rotation_x: 0.0,
        top_left_y: 0.0,
        rotation_y: 0.0,
        pixel_height: -1.0,
    };
    let model = RasterElevationModel::new(data, transform, no_data_value)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let window = crate::types::Window::from_rect(0, 0, cols, rows);
    let range = height_range::estimate_height_range(&window, extension_percent, &model, no_data_value);

    let result = PyDict::new(py);
    result.set_item("min_height", range.min_height)?;
    result.set_item("max_height", range.max_height)?;
    Ok(result.into())
}

/// Names of the built-in DEMs
#[pyfunction]
fn available_dems() -> Vec<&'static str> {
    ElevationModelRegistry::names()
}

#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(subtract_topo_phase, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_height_range, m)?)?;
    m.add_function(wrap_pyfunction!(available_dems, m)?)?;
    Ok(())
}
