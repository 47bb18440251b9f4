//! Built-in tiled SRTM elevation model (1°×1° `.hgt` tiles).

use crate::io::dem::{ElevationModelDescriptor, ElevationSource};
use crate::types::{GeoPos, PixelPos, SarError, SarResult};
use ndarray::Array2;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

/// Northern edge of SRTM coverage (degrees)
const SRTM_LAT_MAX: f64 = 60.0;
/// Southern edge of SRTM coverage (degrees)
const SRTM_LAT_MIN: f64 = -60.0;

type TileKey = (i32, i32);
type TileData = Option<Arc<Array2<i16>>>;

fn tile_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([NS])(\d{2})([EW])(\d{3})\.hgt$").ok())
        .as_ref()
}

/// SRTM tile name for the tile whose south-west corner is (`lat`, `lon`)
pub fn tile_name(lat: i32, lon: i32) -> String {
    let lat_prefix = if lat >= 0 { "N" } else { "S" };
    let lon_prefix = if lon >= 0 { "E" } else { "W" };
    format!("{}{:02}{}{:03}", lat_prefix, lat.abs(), lon_prefix, lon.abs())
}

/// South-west corner of a tile from its file name, e.g. `N45E007.hgt`
pub fn parse_tile_name(file_name: &str) -> Option<(i32, i32)> {
    let caps = tile_name_regex()?.captures(file_name)?;
    let lat: i32 = caps[2].parse().ok()?;
    let lon: i32 = caps[4].parse().ok()?;
    let lat = if &caps[1] == "S" { -lat } else { lat };
    let lon = if &caps[3] == "W" { -lon } else { lon };
    Some((lat, lon))
}

/// Global SRTM mosaic addressed by pixel indices.
///
/// Pixel (0, 0) sits at 60°N, 180°W; x grows east and y grows south.
/// Tiles are read lazily and cached; a tile that cannot be obtained is
/// cached as missing so its samples come back as `None`.
pub struct SrtmElevationModel {
    name: &'static str,
    tile_dir: PathBuf,
    samples_per_degree: usize,
    no_data_value: f64,
    download_url: Option<&'static str>,
    auto_download: bool,
    /// One load cell per tile, so a slow load only blocks readers of that tile
    tiles: RwLock<HashMap<TileKey, Arc<OnceLock<TileData>>>>,
}

impl SrtmElevationModel {
    pub fn new(descriptor: &ElevationModelDescriptor, tile_dir: &Path, auto_download: bool) -> Self {
        let samples_per_degree =
            (descriptor.tile_width_px as f64 / descriptor.tile_width_deg).round() as usize;
        Self {
            name: descriptor.name,
            tile_dir: tile_dir.to_path_buf(),
            samples_per_degree,
            no_data_value: descriptor.no_data_value,
            download_url: descriptor.download_url,
            auto_download,
            tiles: RwLock::new(HashMap::new()),
        }
    }

    /// Names of the `.hgt` tiles present in the tile directory
    pub fn installed_tiles(&self) -> SarResult<Vec<String>> {
        if !self.tile_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut tiles = Vec::new();
        for entry in std::fs::read_dir(&self.tile_dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if parse_tile_name(&file_name).is_some() {
                tiles.push(file_name);
            }
        }
        tiles.sort();
        Ok(tiles)
    }

    fn tile_edge(&self) -> usize {
        self.samples_per_degree + 1
    }

    fn tile_cell(&self, key: TileKey) -> Option<Arc<OnceLock<TileData>>> {
        if let Some(cell) = self.tiles.read().ok()?.get(&key) {
            return Some(Arc::clone(cell));
        }
        let mut tiles = self.tiles.write().ok()?;
        Some(Arc::clone(tiles.entry(key).or_default()))
    }

    fn tile(&self, key: TileKey) -> TileData {
        let cell = self.tile_cell(key)?;
        cell.get_or_init(|| match self.load_tile(key) {
            Ok(tile) => Some(Arc::new(tile)),
            Err(e) => {
                log::warn!("{} tile {} unavailable: {}", self.name, tile_name(key.0, key.1), e);
                None
            }
        })
        .clone()
    }

    fn load_tile(&self, key: TileKey) -> SarResult<Array2<i16>> {
        let path = self.tile_dir.join(format!("{}.hgt", tile_name(key.0, key.1)));

        if !path.exists() {
            let url_template = match self.download_url {
                Some(template) if self.auto_download => template,
                _ => {
                    return Err(SarError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{} not found", path.display()),
                    )))
                }
            };
            std::fs::create_dir_all(&self.tile_dir)?;
            download_tile(url_template, &tile_name(key.0, key.1), &path)?;
        }

        log::debug!("Loading SRTM tile: {}", path.display());
        let bytes = std::fs::read(&path)?;
        parse_hgt(&bytes, self.tile_edge())
    }
}

/// Decode a big-endian 16-bit `.hgt` tile of `edge` x `edge` samples
pub fn parse_hgt(bytes: &[u8], edge: usize) -> SarResult<Array2<i16>> {
    if bytes.len() != edge * edge * 2 {
        return Err(SarError::InvalidFormat(format!(
            "HGT tile has {} bytes, expected {} for {}x{} samples",
            bytes.len(),
            edge * edge * 2,
            edge,
            edge
        )));
    }

    let values: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    Array2::from_shape_vec((edge, edge), values)
        .map_err(|e| SarError::Processing(format!("Failed to reshape HGT data: {}", e)))
}

impl ElevationSource for SrtmElevationModel {
    fn sample(&self, x: i64, y: i64) -> Option<f64> {
        let spd = self.samples_per_degree as i64;
        let rows = ((SRTM_LAT_MAX - SRTM_LAT_MIN) as i64) * spd;
        let cols = 360 * spd;
        if y < 0 || y >= rows || x < 0 || x >= cols {
            return None;
        }

        // tiles are keyed by their south-west corner; row 0 is the north edge
        let tile_lat = SRTM_LAT_MAX as i32 - 1 - (y / spd) as i32;
        let tile_lon = (x / spd) as i32 - 180;
        let row = (y % spd) as usize;
        let col = (x % spd) as usize;

        let tile = self.tile((tile_lat, tile_lon))?;
        Some(tile[[row, col]] as f64)
    }

    fn geodetic_to_index(&self, pos: &GeoPos) -> PixelPos {
        let spd = self.samples_per_degree as f64;
        PixelPos::new((pos.lon + 180.0) * spd, (SRTM_LAT_MAX - pos.lat) * spd)
    }

    fn index_to_geodetic(&self, pixel: &PixelPos) -> GeoPos {
        let spd = self.samples_per_degree as f64;
        let lat = SRTM_LAT_MAX - pixel.y / spd;
        let lon = pixel.x / spd - 180.0;
        if !(SRTM_LAT_MIN..=SRTM_LAT_MAX).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return GeoPos::invalid();
        }
        GeoPos::new(lat, lon)
    }

    fn no_data_value(&self) -> f64 {
        self.no_data_value
    }

    fn spacing_deg(&self) -> (f64, f64) {
        let spacing = 1.0 / self.samples_per_degree as f64;
        (spacing, spacing)
    }
}

/// Download a tile and store it uncompressed as `.hgt`
fn download_tile(url_template: &str, tile: &str, output_path: &Path) -> SarResult<()> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    // mirrors group tiles by their latitude band, e.g. N45/N45E007.hgt.gz
    let url = url_template
        .replace("{dir}", &tile[0..3])
        .replace("{tile}", tile);
    log::info!("Downloading SRTM tile from: {}", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .user_agent("toposub/0.1.0 (SAR Processing Tool)")
        .build()
        .map_err(|e| SarError::Processing(format!("Failed to create HTTP client: {}", e)))?;

    let response = client
        .get(&url)
        .send()
        .map_err(|e| SarError::Processing(format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(SarError::Processing(format!(
            "HTTP {}: {}",
            response.status().as_u16(),
            url
        )));
    }

    let content = response
        .bytes()
        .map_err(|e| SarError::Processing(format!("Failed to read response body: {}", e)))?;

    let decompressed = if content.len() >= 2 && content[0] == 0x1F && content[1] == 0x8B {
        let mut decoder = GzDecoder::new(&content[..]);
        let mut buffer = Vec::new();
        decoder
            .read_to_end(&mut buffer)
            .map_err(|e| SarError::Processing(format!("Failed to decompress gzip data: {}", e)))?;
        buffer
    } else if content.len() >= 4 && content[0..4] == [0x50, 0x4B, 0x03, 0x04] {
        extract_hgt_from_zip(&content)?
    } else {
        content.to_vec()
    };

    if decompressed.is_empty() {
        return Err(SarError::Processing("Downloaded HGT tile is empty".to_string()));
    }

    std::fs::write(output_path, decompressed)?;
    log::info!("Stored SRTM tile {}", output_path.display());
    Ok(())
}

fn extract_hgt_from_zip(zip_data: &[u8]) -> SarResult<Vec<u8>> {
    use std::io::Cursor;
    use zip::ZipArchive;

    let mut archive = ZipArchive::new(Cursor::new(zip_data))
        .map_err(|e| SarError::Processing(format!("Failed to open ZIP archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| SarError::Processing(format!("Failed to read ZIP entry {}: {}", i, e)))?;

        if file.name().ends_with(".hgt") {
            let mut buffer = Vec::new();
            std::io::copy(&mut file, &mut buffer)?;
            return Ok(buffer);
        }
    }

    Err(SarError::Processing("No HGT file found in ZIP archive".to_string()))
}
