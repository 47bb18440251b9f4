//! Synthetic acquisition geometry and elevation sources shared by the
//! scenario tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use ndarray::Array2;
use std::sync::Arc;
use toposub::core::geometry::{ell2xyz, xyz2ell, SPEED_OF_LIGHT};
use toposub::core::stack::{Acquisition, AcquisitionId, ComplexBands};
use toposub::core::{OrbitModel, SlcMetadata};
use toposub::io::{ElevationSource, MemoryRaster, RasterSource};
use toposub::types::{GeoPos, LookSide, OrbitData, PixelPos, Polarization, StateVector};

pub const GM: f64 = 3.986_004_418e14;
pub const ORBIT_RADIUS: f64 = 7_071_000.0;
pub const SCENE_LINES: usize = 100;
pub const SCENE_PIXELS: usize = 100;
pub const ORBIT_DEGREE: usize = 5;
pub const DEM_SPACING_DEG: f64 = 1e-4;
pub const NO_DATA: f64 = -32768.0;

/// Rotation about the z axis giving roughly 100 m of horizontal baseline
pub const BASELINE_ROTATION: f64 = 100.0 / ORBIT_RADIUS;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn reference_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2020-01-03T17:08:15Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Circular polar orbit over longitude `rotation` (radians), flying north
pub fn orbit_data(rotation: f64) -> OrbitData {
    let reference_time = reference_time();
    let omega = (GM / ORBIT_RADIUS.powi(3)).sqrt();
    let (sin_rot, cos_rot) = rotation.sin_cos();

    let state_vectors = (-10..=10)
        .map(|i| {
            let t = i as f64 * 10.0;
            let (s, c) = (omega * t).sin_cos();
            StateVector {
                time: reference_time + Duration::milliseconds((t * 1000.0) as i64),
                position: [
                    ORBIT_RADIUS * c * cos_rot,
                    ORBIT_RADIUS * c * sin_rot,
                    ORBIT_RADIUS * s,
                ],
                velocity: [
                    -ORBIT_RADIUS * omega * s * cos_rot,
                    -ORBIT_RADIUS * omega * s * sin_rot,
                    ORBIT_RADIUS * omega * c,
                ],
            }
        })
        .collect();

    OrbitData {
        state_vectors,
        reference_time,
    }
}

pub fn metadata(product_id: &str) -> SlcMetadata {
    SlcMetadata {
        product_id: product_id.to_string(),
        mission: "S1A".to_string(),
        first_line_time: reference_time(),
        prf: 250.0,
        slant_range_time: 2.0 * 850_000.0 / SPEED_OF_LIGHT,
        range_sampling_rate: 32.0e6,
        wavelength: 0.0555,
        look_side: LookSide::Right,
        num_lines: SCENE_LINES,
        num_pixels: SCENE_PIXELS,
    }
}

pub fn fitted_orbit(rotation: f64) -> OrbitModel {
    OrbitModel::fit(&orbit_data(rotation), ORBIT_DEGREE).unwrap()
}

/// Observed interferogram with a smooth fringe pattern and varying amplitude
pub fn observed_bands() -> ComplexBands {
    let phase = |i: usize, j: usize| 0.1 * i as f64 + 0.05 * j as f64;
    let amplitude = |i: usize, j: usize| 1.0 + 0.01 * (i + j) as f64;
    let real = Array2::from_shape_fn((SCENE_LINES, SCENE_PIXELS), |(i, j)| {
        (amplitude(i, j) * phase(i, j).cos()) as f32
    });
    let imag = Array2::from_shape_fn((SCENE_LINES, SCENE_PIXELS), |(i, j)| {
        (amplitude(i, j) * phase(i, j).sin()) as f32
    });

    let real: Arc<dyn RasterSource> = Arc::new(MemoryRaster::new(real));
    let imag: Arc<dyn RasterSource> = Arc::new(MemoryRaster::new(imag));
    ComplexBands::new(real, imag).unwrap()
}

pub fn acquisition(
    abs_orbit: u32,
    date: NaiveDate,
    polarization: Option<Polarization>,
    rotation: f64,
    bands: Option<ComplexBands>,
) -> Acquisition {
    Acquisition {
        id: AcquisitionId::new(abs_orbit, date),
        polarization,
        metadata: metadata(&format!("S1A_{}", abs_orbit)),
        orbit_data: orbit_data(rotation),
        bands,
    }
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
}

/// Expected topographic phase of a flat surface at `height` for one image
/// position, straight from the orbit geometry
pub fn flat_terrain_phase(
    meta: &SlcMetadata,
    ref_orbit: &OrbitModel,
    cmp_orbit: &OrbitModel,
    line: f64,
    pixel: f64,
    height: f64,
) -> f64 {
    let point = ref_orbit.lp2xyz(line, pixel, height, meta).unwrap();
    let (geo, _) = xyz2ell(&point);
    let point = ell2xyz(&geo, height);

    let t_ref = ref_orbit.xyz2t(&point, meta).unwrap();
    let t_cmp = cmp_orbit.xyz2t(&point, meta).unwrap();
    let r_ref = (point - ref_orbit.position(t_ref)).norm();
    let r_cmp = (point - cmp_orbit.position(t_cmp)).norm();

    meta.min_four_pi_over_lambda() * (r_ref - r_cmp)
}

/// Unbounded regular lat/lon DEM of constant height.
///
/// Pixel (0, 0) sits at 1°N, 1°W. Coverage can be limited to a latitude
/// band; outside it samples are missing and positions invalid.
pub struct ConstantDem {
    pub height: f64,
    pub no_data: f64,
    pub lat_limits: Option<(f64, f64)>,
}

impl ConstantDem {
    const LAT_TOP: f64 = 1.0;
    const LON_LEFT: f64 = -1.0;

    pub fn new(height: f64) -> Self {
        Self {
            height,
            no_data: NO_DATA,
            lat_limits: None,
        }
    }

    pub fn limited_to(height: f64, lat_min: f64, lat_max: f64) -> Self {
        Self {
            lat_limits: Some((lat_min, lat_max)),
            ..Self::new(height)
        }
    }

    fn covers(&self, lat: f64) -> bool {
        match self.lat_limits {
            Some((lo, hi)) => lat >= lo && lat <= hi,
            None => true,
        }
    }
}

impl ElevationSource for ConstantDem {
    fn sample(&self, _x: i64, y: i64) -> Option<f64> {
        let lat = Self::LAT_TOP - y as f64 * DEM_SPACING_DEG;
        self.covers(lat).then_some(self.height)
    }

    fn geodetic_to_index(&self, pos: &GeoPos) -> PixelPos {
        PixelPos::new(
            (pos.lon - Self::LON_LEFT) / DEM_SPACING_DEG,
            (Self::LAT_TOP - pos.lat) / DEM_SPACING_DEG,
        )
    }

    fn index_to_geodetic(&self, pixel: &PixelPos) -> GeoPos {
        let pos = GeoPos::new(
            Self::LAT_TOP - pixel.y * DEM_SPACING_DEG,
            Self::LON_LEFT + pixel.x * DEM_SPACING_DEG,
        );
        if self.covers(pos.lat) {
            pos
        } else {
            GeoPos::invalid()
        }
    }

    fn no_data_value(&self) -> f64 {
        self.no_data
    }

    fn spacing_deg(&self) -> (f64, f64) {
        (DEM_SPACING_DEG, DEM_SPACING_DEG)
    }
}
