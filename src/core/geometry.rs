//! Ellipsoid geometry, acquisition metadata and tile corner geocoding.

use crate::core::orbit::OrbitModel;
use crate::types::{GeoPoint, LookSide, SarResult, Window};
use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis (m)
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 semi-minor axis (m)
pub const WGS84_B: f64 = 6_356_752.314_245;
/// WGS84 first eccentricity squared
pub const WGS84_E2: f64 = 0.006_694_379_990_14;
/// Speed of light (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Radar acquisition parameters needed to move between image and ground space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlcMetadata {
    pub product_id: String,
    pub mission: String,
    /// Azimuth time of the first line
    pub first_line_time: DateTime<Utc>,
    /// Line rate in Hz (lines per second of azimuth time)
    pub prf: f64,
    /// Two-way slant range time to the first pixel (seconds)
    pub slant_range_time: f64,
    /// Range sampling rate in Hz
    pub range_sampling_rate: f64,
    /// Radar wavelength (meters)
    pub wavelength: f64,
    pub look_side: LookSide,
    pub num_lines: usize,
    pub num_pixels: usize,
}

impl SlcMetadata {
    /// Slant range (m) of a fractional pixel
    pub fn pixel_to_range(&self, pixel: f64) -> f64 {
        (self.slant_range_time + pixel / self.range_sampling_rate) * SPEED_OF_LIGHT / 2.0
    }

    /// Fractional pixel of a slant range (m)
    pub fn range_to_pixel(&self, range: f64) -> f64 {
        (2.0 * range / SPEED_OF_LIGHT - self.slant_range_time) * self.range_sampling_rate
    }

    /// Two-way phase factor -4π/λ
    pub fn min_four_pi_over_lambda(&self) -> f64 {
        -4.0 * std::f64::consts::PI / self.wavelength
    }
}

/// Geodetic coordinates (radians, meters) to ECEF
pub fn ell2xyz(geo: &GeoPoint, height: f64) -> Vector3<f64> {
    let (sin_lat, cos_lat) = geo.lat.sin_cos();
    let (sin_lon, cos_lon) = geo.lon.sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    Vector3::new(
        (n + height) * cos_lat * cos_lon,
        (n + height) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + height) * sin_lat,
    )
}

/// ECEF to geodetic coordinates (Bowring), returns position and height
pub fn xyz2ell(xyz: &Vector3<f64>) -> (GeoPoint, f64) {
    let ep2 = (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
    let r = (xyz.x * xyz.x + xyz.y * xyz.y).sqrt();
    let nu = (xyz.z * WGS84_A).atan2(r * WGS84_B);
    let (sin_nu, cos_nu) = nu.sin_cos();

    let lat = (xyz.z + ep2 * WGS84_B * sin_nu.powi(3))
        .atan2(r - WGS84_E2 * WGS84_A * cos_nu.powi(3));
    let lon = xyz.y.atan2(xyz.x);

    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let height = if lat.cos().abs() > 1e-10 {
        r / lat.cos() - n
    } else {
        xyz.z.abs() - WGS84_B
    };

    (GeoPoint::new(lat, lon), height)
}

/// Geocode the four corners of `window` at `height` and return the
/// upper-left (max lat, min lon) and lower-right (min lat, max lon) pair.
pub fn compute_corners(
    meta: &SlcMetadata,
    orbit: &OrbitModel,
    window: &Window,
    height: f64,
) -> SarResult<[GeoPoint; 2]> {
    let corners = [
        (window.line_lo, window.pixel_lo),
        (window.line_lo, window.pixel_hi),
        (window.line_hi, window.pixel_lo),
        (window.line_hi, window.pixel_hi),
    ];

    let mut lat_min = f64::INFINITY;
    let mut lat_max = f64::NEG_INFINITY;
    let mut lon_min = f64::INFINITY;
    let mut lon_max = f64::NEG_INFINITY;

    for (line, pixel) in corners {
        let geo = orbit.lp2ell(line as f64, pixel as f64, height, meta)?;
        lat_min = lat_min.min(geo.lat);
        lat_max = lat_max.max(geo.lat);
        lon_min = lon_min.min(geo.lon);
        lon_max = lon_max.max(geo.lon);
    }

    Ok([GeoPoint::new(lat_max, lon_min), GeoPoint::new(lat_min, lon_max)])
}

/// Extra latitude/longitude needed so that terrain between `height_min`
/// and `height_max` cannot be displaced outside the ellipsoid footprint.
///
/// The margin is the largest corner shift between geocoding on the
/// ellipsoid and geocoding at either height bound.
pub fn define_extra_phi_lam(
    height_min: f64,
    height_max: f64,
    window: &Window,
    meta: &SlcMetadata,
    orbit: &OrbitModel,
) -> SarResult<GeoPoint> {
    if height_min == 0.0 && height_max == 0.0 {
        return Ok(GeoPoint::new(0.0, 0.0));
    }

    let base = compute_corners(meta, orbit, window, 0.0)?;
    let mut extra_lat: f64 = 0.0;
    let mut extra_lon: f64 = 0.0;

    for height in [height_min, height_max] {
        let shifted = compute_corners(meta, orbit, window, height)?;
        for (a, b) in base.iter().zip(shifted.iter()) {
            extra_lat = extra_lat.max((a.lat - b.lat).abs());
            extra_lon = extra_lon.max((a.lon - b.lon).abs());
        }
    }

    Ok(GeoPoint::new(extra_lat, extra_lon))
}

/// Widen an upper-left/lower-right corner pair by `extra` on every side
pub fn extend_corners(extra: &GeoPoint, corners: &[GeoPoint; 2]) -> [GeoPoint; 2] {
    [
        GeoPoint::new(corners[0].lat + extra.lat, corners[0].lon - extra.lon),
        GeoPoint::new(corners[1].lat - extra.lat, corners[1].lon + extra.lon),
    ]
}
