//! Radar coding of a DEM tile and resampling onto the radar grid.

use crate::core::dem_tile::DemTile;
use crate::core::geometry::{ell2xyz, SlcMetadata};
use crate::core::orbit::OrbitModel;
use crate::types::{SarError, SarResult, Window};
use ndarray::Array2;

/// Barycentric tolerance for points on a triangle edge
const EDGE_EPSILON: f64 = 1e-9;

/// Simulated topographic phase (and elevation) on a radar tile grid
#[derive(Debug, Clone)]
pub struct TopoPhaseResult {
    pub window: Window,
    /// Unwrapped phase in radians
    pub phase: Array2<f64>,
    /// Terrain height in radar geometry, when requested
    pub elevation: Option<Array2<f64>>,
    /// Cells reached by the radar-coded DEM mesh
    pub valid: Array2<bool>,
    pub no_data_value: f64,
}

impl TopoPhaseResult {
    /// Fraction of tile cells that received a simulated value
    pub fn coverage(&self) -> f64 {
        let total = self.valid.len();
        if total == 0 {
            return 0.0;
        }
        self.valid.iter().filter(|&&v| v).count() as f64 / total as f64
    }
}

/// One DEM sample expressed in reference radar geometry
#[derive(Debug, Clone, Copy)]
struct RadarCodedPoint {
    line: f64,
    pixel: f64,
    phase: f64,
    height: f64,
}

/// Topographic phase simulation for one interferometric pair and one tile
pub struct TopoPhase<'a> {
    ref_meta: &'a SlcMetadata,
    ref_orbit: &'a OrbitModel,
    cmp_meta: &'a SlcMetadata,
    cmp_orbit: &'a OrbitModel,
    window: Window,
    dem: &'a DemTile,
    coded: Option<Array2<RadarCodedPoint>>,
}

impl<'a> TopoPhase<'a> {
    pub fn new(
        ref_meta: &'a SlcMetadata,
        ref_orbit: &'a OrbitModel,
        cmp_meta: &'a SlcMetadata,
        cmp_orbit: &'a OrbitModel,
        window: Window,
        dem: &'a DemTile,
    ) -> Self {
        Self {
            ref_meta,
            ref_orbit,
            cmp_meta,
            cmp_orbit,
            window,
            dem,
            coded: None,
        }
    }

    /// Map every DEM sample to reference (line, pixel) and compute the
    /// interferometric phase of its range difference.
    ///
    /// The phase is `-4π/λ_ref · R_ref + 4π/λ_cmp · R_cmp`. Zero-Doppler
    /// times are warm-started from the previous sample.
    pub fn radar_code(&mut self) -> SarResult<()> {
        let (rows, cols) = self.dem.data.dim();
        let ref_factor = self.ref_meta.min_four_pi_over_lambda();
        let cmp_factor = self.cmp_meta.min_four_pi_over_lambda();

        let mut times: Option<(f64, f64)> = None;
        let mut coded = Vec::with_capacity(rows * cols);

        for row in 0..rows {
            for col in 0..cols {
                let height = self.dem.height(row, col);
                let point = ell2xyz(&self.dem.position(row, col), height);

                let (t_ref, t_cmp) = match times {
                    Some((t_ref, t_cmp)) => (
                        self.ref_orbit.xyz2t_from(&point, t_ref)?,
                        self.cmp_orbit.xyz2t_from(&point, t_cmp)?,
                    ),
                    None => (
                        self.ref_orbit.xyz2t(&point, self.ref_meta)?,
                        self.cmp_orbit.xyz2t(&point, self.cmp_meta)?,
                    ),
                };
                times = Some((t_ref, t_cmp));

                let reference = self.ref_orbit.radar_coordinate_at(&point, t_ref, self.ref_meta);
                let cmp_range = (point - self.cmp_orbit.position(t_cmp)).norm();

                coded.push(RadarCodedPoint {
                    line: reference.line,
                    pixel: reference.pixel,
                    phase: ref_factor * reference.slant_range - cmp_factor * cmp_range,
                    height,
                });
            }
        }

        let coded = Array2::from_shape_vec((rows, cols), coded)
            .map_err(|e| SarError::Processing(format!("Radar-coded grid shape mismatch: {}", e)))?;
        self.coded = Some(coded);
        Ok(())
    }

    /// Resample the radar-coded DEM onto the tile grid.
    ///
    /// Each DEM cell is split into two triangles that are rasterised in
    /// radar geometry with barycentric interpolation. Cells no triangle
    /// reaches are left at the no-data value and marked invalid.
    pub fn grid_data(&self, want_elevation: bool) -> SarResult<TopoPhaseResult> {
        let coded = self.coded.as_ref().ok_or_else(|| {
            SarError::Processing("Topographic phase gridded before radar coding".to_string())
        })?;

        let no_data = self.dem.no_data_value;
        let shape = self.window.shape();
        let mut phase = Array2::from_elem(shape, no_data);
        let mut elevation = want_elevation.then(|| Array2::from_elem(shape, no_data));
        let mut valid = Array2::from_elem(shape, false);

        let (rows, cols) = coded.dim();
        for row in 0..rows.saturating_sub(1) {
            for col in 0..cols.saturating_sub(1) {
                let a = coded[[row, col]];
                let b = coded[[row, col + 1]];
                let c = coded[[row + 1, col]];
                let d = coded[[row + 1, col + 1]];

                for triangle in [[a, b, c], [b, d, c]] {
                    self.rasterise(&triangle, &mut phase, elevation.as_mut(), &mut valid);
                }
            }
        }

        Ok(TopoPhaseResult {
            window: self.window,
            phase,
            elevation,
            valid,
            no_data_value: no_data,
        })
    }

    fn rasterise(
        &self,
        vertices: &[RadarCodedPoint; 3],
        phase: &mut Array2<f64>,
        mut elevation: Option<&mut Array2<f64>>,
        valid: &mut Array2<bool>,
    ) {
        let (lines, pixels) = self.window.shape();
        let line_lo = self.window.line_lo as f64;
        let pixel_lo = self.window.pixel_lo as f64;

        let ys = vertices.map(|v| v.line - line_lo);
        let xs = vertices.map(|v| v.pixel - pixel_lo);

        let denom = (ys[1] - ys[2]) * (xs[0] - xs[2]) + (xs[2] - xs[1]) * (ys[0] - ys[2]);
        if denom.abs() < EDGE_EPSILON || !denom.is_finite() {
            return;
        }

        let y_min = ys.iter().cloned().fold(f64::INFINITY, f64::min).ceil().max(0.0);
        let y_max = ys
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
            .floor()
            .min(lines as f64 - 1.0);
        let x_min = xs.iter().cloned().fold(f64::INFINITY, f64::min).ceil().max(0.0);
        let x_max = xs
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
            .floor()
            .min(pixels as f64 - 1.0);
        if y_min > y_max || x_min > x_max {
            return;
        }

        for y in (y_min as usize)..=(y_max as usize) {
            for x in (x_min as usize)..=(x_max as usize) {
                let (yf, xf) = (y as f64, x as f64);
                let w0 = ((ys[1] - ys[2]) * (xf - xs[2]) + (xs[2] - xs[1]) * (yf - ys[2])) / denom;
                let w1 = ((ys[2] - ys[0]) * (xf - xs[2]) + (xs[0] - xs[2]) * (yf - ys[2])) / denom;
                let w2 = 1.0 - w0 - w1;
                if w0 < -EDGE_EPSILON || w1 < -EDGE_EPSILON || w2 < -EDGE_EPSILON {
                    continue;
                }

                phase[[y, x]] =
                    w0 * vertices[0].phase + w1 * vertices[1].phase + w2 * vertices[2].phase;
                if let Some(elevation) = elevation.as_deref_mut() {
                    elevation[[y, x]] =
                        w0 * vertices[0].height + w1 * vertices[1].height + w2 * vertices[2].height;
                }
                valid[[y, x]] = true;
            }
        }
    }
}

/// Simulate the topographic phase of one pair over `window`.
///
/// Any geocoding failure aborts the whole tile.
pub fn synthesize(
    ref_meta: &SlcMetadata,
    ref_orbit: &OrbitModel,
    cmp_meta: &SlcMetadata,
    cmp_orbit: &OrbitModel,
    window: &Window,
    dem_tile: &DemTile,
    want_elevation: bool,
) -> SarResult<TopoPhaseResult> {
    let mut topo = TopoPhase::new(ref_meta, ref_orbit, cmp_meta, cmp_orbit, *window, dem_tile);
    topo.radar_code()?;
    topo.grid_data(want_elevation)
}
