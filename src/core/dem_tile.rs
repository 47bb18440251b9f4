//! Extraction of the local elevation raster that covers one radar tile.

use crate::core::geometry::{compute_corners, define_extra_phi_lam, extend_corners, SlcMetadata};
use crate::core::height_range::estimate_height_range;
use crate::core::orbit::OrbitModel;
use crate::io::dem::{DemContext, ElevationSource};
use crate::types::{ElevationRange, GeoPoint, PixelPos, SarResult, Window};
use ndarray::Array2;

/// Dense elevation raster on the DEM lattice.
///
/// Row `i`, column `j` sits at `(lat0 - i * lat_spacing, lon0 + j * lon_spacing)`.
/// Samples that could not be read hold `no_data_value`.
#[derive(Debug, Clone)]
pub struct DemTile {
    /// Latitude of the upper-left sample (radians)
    pub lat0: f64,
    /// Longitude of the upper-left sample (radians)
    pub lon0: f64,
    pub n_lat_pixels: usize,
    pub n_lon_pixels: usize,
    /// Radians per sample, positive
    pub lat_spacing: f64,
    /// Radians per sample, positive
    pub lon_spacing: f64,
    pub no_data_value: f64,
    pub data: Array2<f64>,
}

impl DemTile {
    /// Geodetic position of sample `(row, col)`
    pub fn position(&self, row: usize, col: usize) -> GeoPoint {
        GeoPoint::new(
            self.lat0 - row as f64 * self.lat_spacing,
            self.lon0 + col as f64 * self.lon_spacing,
        )
    }

    /// Height used for radar coding; no-data samples count as sea level
    pub fn height(&self, row: usize, col: usize) -> f64 {
        let h = self.data[[row, col]];
        if h.is_nan() || h == self.no_data_value {
            0.0
        } else {
            h
        }
    }

    pub fn is_no_data(&self, row: usize, col: usize) -> bool {
        let h = self.data[[row, col]];
        h.is_nan() || h == self.no_data_value
    }

    /// Whether no sample of the tile holds a real height
    pub fn is_empty(&self) -> bool {
        self.data
            .iter()
            .all(|&h| h.is_nan() || h == self.no_data_value)
    }
}

/// Enlarged tile footprint in DEM indices, outward-rounded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemFootprint {
    pub upper_left: PixelPos,
    pub lower_right: PixelPos,
}

impl DemFootprint {
    pub fn n_lat_pixels(&self) -> usize {
        (self.lower_right.y - self.upper_left.y).abs() as usize + 1
    }

    pub fn n_lon_pixels(&self) -> usize {
        (self.lower_right.x - self.upper_left.x).abs() as usize + 1
    }
}

/// DEM index of a geodetic point given in radians
fn to_dem_index(source: &dyn ElevationSource, point: &GeoPoint) -> PixelPos {
    source.geodetic_to_index(&point.to_degrees())
}

/// Footprint of `window` widened by the ground displacement that terrain
/// within `range` can cause, converted to DEM indices with the upper-left
/// floored and the lower-right ceiled.
pub fn extend_footprint(
    window: &Window,
    meta: &SlcMetadata,
    orbit: &OrbitModel,
    range: &ElevationRange,
    source: &dyn ElevationSource,
) -> SarResult<DemFootprint> {
    let corners = compute_corners(meta, orbit, window, 0.0)?;
    let extra = define_extra_phi_lam(range.min_height, range.max_height, window, meta, orbit)?;
    let extended = extend_corners(&extra, &corners);

    let upper_left = to_dem_index(source, &extended[0]);
    let lower_right = to_dem_index(source, &extended[1]);

    Ok(DemFootprint {
        upper_left: PixelPos::new(upper_left.x.floor(), upper_left.y.floor()),
        lower_right: PixelPos::new(lower_right.x.ceil(), lower_right.y.ceil()),
    })
}

/// Elevation raster covering `window` of the acquisition described by
/// `meta` and `orbit`.
///
/// Returns `Ok(None)` when the footprint anchor falls outside the DEM
/// coverage; the tile then cannot be corrected. Geocoding failures are
/// errors. Unreadable or NaN samples become the DEM no-data value.
pub fn build_dem_tile(
    window: &Window,
    meta: &SlcMetadata,
    orbit: &OrbitModel,
    dem: &DemContext,
    extension_percent: u32,
) -> SarResult<Option<DemTile>> {
    let source = dem.source.as_ref();

    let corners = compute_corners(meta, orbit, window, 0.0)?;
    let ul = to_dem_index(source, &corners[0]);
    let lr = to_dem_index(source, &corners[1]);
    let initial = Window::new(
        ul.y.round() as i64,
        lr.y.round() as i64,
        ul.x.round() as i64,
        lr.x.round() as i64,
    );

    let range = estimate_height_range(&initial, extension_percent, source, dem.no_data_value);
    let footprint = extend_footprint(window, meta, orbit, &range, source)?;

    let anchor = source.index_to_geodetic(&footprint.upper_left);
    if !anchor.is_valid() {
        log::warn!(
            "No DEM coverage for tile {} (anchor at DEM index {:.0}, {:.0})",
            window,
            footprint.upper_left.x,
            footprint.upper_left.y
        );
        return Ok(None);
    }

    let n_lat = footprint.n_lat_pixels();
    let n_lon = footprint.n_lon_pixels();
    let start_x = footprint.upper_left.x as i64;
    let start_y = footprint.upper_left.y as i64;

    log::debug!(
        "DEM tile for {}: {} x {} samples, heights [{:.1}, {:.1}] m",
        window,
        n_lat,
        n_lon,
        range.min_height,
        range.max_height
    );

    let no_data = dem.no_data_value;
    let data = Array2::from_shape_fn((n_lat, n_lon), |(i, j)| {
        source
            .sample(start_x + j as i64, start_y + i as i64)
            .filter(|h| !h.is_nan())
            .unwrap_or(no_data)
    });

    let anchor = anchor.to_radians();
    Ok(Some(DemTile {
        lat0: anchor.lat,
        lon0: anchor.lon,
        n_lat_pixels: n_lat,
        n_lon_pixels: n_lon,
        lat_spacing: dem.sampling_lat.abs(),
        lon_spacing: dem.sampling_lon.abs(),
        no_data_value: no_data,
        data,
    }))
}
