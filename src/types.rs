use chrono::{DateTime, Utc};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Complex interferogram sample (I + jQ)
pub type SarComplex = Complex<f64>;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl FromStr for Polarization {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(SarError::InvalidFormat(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Side the antenna looks to, relative to the flight direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookSide {
    Right,
    Left,
}

/// Orbit state vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVector {
    pub time: DateTime<Utc>,
    pub position: [f64; 3],  // [x, y, z] in meters
    pub velocity: [f64; 3],  // [vx, vy, vz] in m/s
}

/// Precise orbit information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitData {
    pub state_vectors: Vec<StateVector>,
    pub reference_time: DateTime<Utc>,
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

/// Axis-aligned rectangle in (line, pixel) space, bounds inclusive.
///
/// Used both for radar tiles and for DEM extraction windows, so bounds may
/// be negative. Construction orders the bounds, hence `line_hi >= line_lo`
/// and `pixel_hi >= pixel_lo` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub line_lo: i64,
    pub line_hi: i64,
    pub pixel_lo: i64,
    pub pixel_hi: i64,
}

impl Window {
    pub fn new(line_lo: i64, line_hi: i64, pixel_lo: i64, pixel_hi: i64) -> Self {
        Self {
            line_lo: line_lo.min(line_hi),
            line_hi: line_lo.max(line_hi),
            pixel_lo: pixel_lo.min(pixel_hi),
            pixel_hi: pixel_lo.max(pixel_hi),
        }
    }

    /// Window from a host rectangle (x = pixel, y = line, width, height)
    pub fn from_rect(x: i64, y: i64, width: usize, height: usize) -> Self {
        let width = width.max(1) as i64;
        let height = height.max(1) as i64;
        Self::new(y, y + height - 1, x, x + width - 1)
    }

    pub fn lines(&self) -> usize {
        (self.line_hi - self.line_lo + 1) as usize
    }

    pub fn pixels(&self) -> usize {
        (self.pixel_hi - self.pixel_lo + 1) as usize
    }

    /// Raster shape matching this window, `(lines, pixels)`
    pub fn shape(&self) -> (usize, usize) {
        (self.lines(), self.pixels())
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lines [{}, {}], pixels [{}, {}]",
            self.line_lo, self.line_hi, self.pixel_lo, self.pixel_hi
        )
    }
}

/// Geodetic position in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn to_degrees(&self) -> GeoPos {
        GeoPos::new(self.lat.to_degrees(), self.lon.to_degrees())
    }
}

/// Geodetic position in degrees, as exchanged with elevation sources
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPos {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Position that marks "outside coverage"
    pub fn invalid() -> Self {
        Self { lat: f64::NAN, lon: f64::NAN }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn to_radians(&self) -> GeoPoint {
        GeoPoint::new(self.lat.to_radians(), self.lon.to_radians())
    }
}

/// Fractional pixel position in an elevation source (x = column, y = row)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

impl PixelPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Terrain height bounds of a tile, in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElevationRange {
    pub min_height: f64,
    pub max_height: f64,
}

impl ElevationRange {
    pub fn new(min_height: f64, max_height: f64) -> Self {
        Self { min_height, max_height }
    }

    /// Range used when a tile has no reliable elevation samples
    pub fn sea_level() -> Self {
        Self::default()
    }
}

/// Error types for SAR processing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Geocoding error: {0}")]
    Geocoding(String),

    #[error("Topographic phase synthesis failed for pair {pair}, tile {window}: {reason}")]
    Synthesis {
        pair: String,
        window: Window,
        reason: String,
    },

    #[error("Reading interferogram bands failed for pair {pair}, tile {window}: {reason}")]
    BandRead {
        pair: String,
        window: Window,
        reason: String,
    },

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;
