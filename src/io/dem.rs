//! Elevation sources: the sampling interface, in-memory/external rasters,
//! the built-in DEM registry and the once-only DEM provider.

use crate::io::srtm::SrtmElevationModel;
use crate::types::{GeoPos, GeoTransform, PixelPos, SarError, SarResult};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Source of elevation samples addressed by integer DEM pixel indices.
///
/// Implementations must be safe for concurrent reads once constructed.
pub trait ElevationSource: Send + Sync {
    /// Raw height at pixel (x = column, y = row), `None` when the sample
    /// cannot be obtained (outside coverage, missing tile, read failure)
    fn sample(&self, x: i64, y: i64) -> Option<f64>;

    /// Fractional pixel position of a geodetic position (degrees)
    fn geodetic_to_index(&self, pos: &GeoPos) -> PixelPos;

    /// Geodetic position (degrees) of a pixel; invalid outside coverage
    fn index_to_geodetic(&self, pixel: &PixelPos) -> GeoPos;

    fn no_data_value(&self) -> f64;

    /// Sample spacing in degrees, `(lat, lon)`, both positive
    fn spacing_deg(&self) -> (f64, f64);

    /// Height at a pixel, with NaN and the no-data sentinel filtered out
    fn valid_sample(&self, x: i64, y: i64) -> Option<f64> {
        let no_data = self.no_data_value();
        self.sample(x, y).filter(|h| !h.is_nan() && *h != no_data)
    }
}

/// North-up elevation raster held in memory.
///
/// Backs the external-DEM option (read through GDAL) and any caller that
/// already has heights on a regular lat/lon grid.
pub struct RasterElevationModel {
    data: Array2<f32>,
    transform: GeoTransform,
    no_data_value: f64,
}

impl RasterElevationModel {
    pub fn new(data: Array2<f32>, transform: GeoTransform, no_data_value: f64) -> SarResult<Self> {
        if transform.pixel_width == 0.0 || transform.pixel_height == 0.0 {
            return Err(SarError::InvalidFormat(
                "DEM geotransform has zero pixel size".to_string(),
            ));
        }
        if transform.rotation_x != 0.0 || transform.rotation_y != 0.0 {
            return Err(SarError::InvalidFormat(
                "Rotated DEM geotransforms are not supported".to_string(),
            ));
        }
        // rows must run south and columns east
        if transform.pixel_height > 0.0 || transform.pixel_width < 0.0 {
            return Err(SarError::InvalidFormat(format!(
                "DEM must be north-up with columns running east (pixel size {} x {})",
                transform.pixel_width, transform.pixel_height
            )));
        }

        Ok(Self {
            data,
            transform,
            no_data_value,
        })
    }

    /// Load an external DEM file through GDAL with a user-declared no-data value
    #[cfg(feature = "gdal")]
    pub fn from_file<P: AsRef<Path>>(dem_path: P, no_data_value: f64) -> SarResult<Self> {
        use gdal::Dataset;

        log::info!("Reading external DEM from: {}", dem_path.as_ref().display());

        let dataset = Dataset::open(dem_path.as_ref())?;
        let geo_transform = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();
        log::debug!("DEM size: {}x{}", width, height);

        let rasterband = dataset.rasterband(1)?;
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        let dem_array = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| SarError::Processing(format!("Failed to reshape DEM data: {}", e)))?;

        let transform = GeoTransform {
            top_left_x: geo_transform[0],
            pixel_width: geo_transform[1],
            rotation_x: geo_transform[2],
            top_left_y: geo_transform[3],
            rotation_y: geo_transform[4],
            pixel_height: geo_transform[5],
        };

        Self::new(dem_array, transform, no_data_value)
    }

    #[cfg(not(feature = "gdal"))]
    pub fn from_file<P: AsRef<Path>>(dem_path: P, _no_data_value: f64) -> SarResult<Self> {
        Err(SarError::Config(format!(
            "Cannot read external DEM '{}': built without the `gdal` feature",
            dem_path.as_ref().display()
        )))
    }
}

impl ElevationSource for RasterElevationModel {
    fn sample(&self, x: i64, y: i64) -> Option<f64> {
        if x < 0 || y < 0 {
            return None;
        }
        self.data.get((y as usize, x as usize)).map(|&h| h as f64)
    }

    fn geodetic_to_index(&self, pos: &GeoPos) -> PixelPos {
        PixelPos::new(
            (pos.lon - self.transform.top_left_x) / self.transform.pixel_width,
            (pos.lat - self.transform.top_left_y) / self.transform.pixel_height,
        )
    }

    fn index_to_geodetic(&self, pixel: &PixelPos) -> GeoPos {
        let (height, width) = self.data.dim();
        if pixel.x < 0.0 || pixel.y < 0.0 || pixel.x >= width as f64 || pixel.y >= height as f64 {
            return GeoPos::invalid();
        }
        GeoPos::new(
            self.transform.top_left_y + pixel.y * self.transform.pixel_height,
            self.transform.top_left_x + pixel.x * self.transform.pixel_width,
        )
    }

    fn no_data_value(&self) -> f64 {
        self.no_data_value
    }

    fn spacing_deg(&self) -> (f64, f64) {
        (
            self.transform.pixel_height.abs(),
            self.transform.pixel_width.abs(),
        )
    }
}

/// Description of a built-in tiled DEM
#[derive(Debug, Clone)]
pub struct ElevationModelDescriptor {
    pub name: &'static str,
    /// Directory name under the DEM cache
    pub cache_subdir: &'static str,
    pub tile_width_deg: f64,
    /// Samples per tile edge, excluding the shared border sample
    pub tile_width_px: usize,
    pub no_data_value: f64,
    /// Gzipped tile URL with `{dir}` (e.g. `N45`) and `{tile}` placeholders
    pub download_url: Option<&'static str>,
}

impl ElevationModelDescriptor {
    /// Sample spacing in degrees
    pub fn spacing_deg(&self) -> f64 {
        self.tile_width_deg / self.tile_width_px as f64
    }

    /// Create the DEM from tiles stored under `cache_dir`.
    ///
    /// Fails when no tile is installed and downloading is disabled.
    pub fn create_dem(&self, cache_dir: &Path, auto_download: bool) -> SarResult<SrtmElevationModel> {
        let tile_dir = cache_dir.join(self.cache_subdir);
        let model = SrtmElevationModel::new(self, &tile_dir, auto_download);

        if !auto_download && model.installed_tiles()?.is_empty() {
            return Err(SarError::Config(format!(
                "The DEM '{}' has not been installed (no tiles in {})",
                self.name,
                tile_dir.display()
            )));
        }

        Ok(model)
    }
}

static DESCRIPTORS: [ElevationModelDescriptor; 2] = [
    ElevationModelDescriptor {
        name: "SRTM 3Sec",
        cache_subdir: "srtm3",
        tile_width_deg: 1.0,
        tile_width_px: 1200,
        no_data_value: -32768.0,
        download_url: None,
    },
    ElevationModelDescriptor {
        name: "SRTM 1Sec HGT",
        cache_subdir: "srtm1",
        tile_width_deg: 1.0,
        tile_width_px: 3600,
        no_data_value: -32768.0,
        download_url: Some("https://s3.amazonaws.com/elevation-tiles-prod/skadi/{dir}/{tile}.hgt.gz"),
    },
];

/// Lookup of built-in DEMs by name
pub struct ElevationModelRegistry;

impl ElevationModelRegistry {
    pub fn descriptor(name: &str) -> Option<&'static ElevationModelDescriptor> {
        DESCRIPTORS.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn names() -> Vec<&'static str> {
        DESCRIPTORS.iter().map(|d| d.name).collect()
    }
}

/// Which elevation source a run uses, fixed before any tile is processed
#[derive(Clone)]
pub enum DemSelection {
    /// Built-in tiled DEM looked up in the registry
    Builtin {
        name: String,
        cache_dir: PathBuf,
        auto_download: bool,
    },
    /// User-supplied elevation file with its own no-data value
    External { path: PathBuf, no_data_value: f64 },
    /// Source constructed by the caller
    Custom {
        name: String,
        source: Arc<dyn ElevationSource>,
    },
}

impl std::fmt::Debug for DemSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemSelection::Builtin { name, .. } => write!(f, "Builtin({})", name),
            DemSelection::External { path, .. } => write!(f, "External({})", path.display()),
            DemSelection::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

/// Initialised elevation source shared read-only by all tiles
pub struct DemContext {
    pub name: String,
    pub source: Arc<dyn ElevationSource>,
    pub no_data_value: f64,
    /// Latitude sampling in radians per sample
    pub sampling_lat: f64,
    /// Longitude sampling in radians per sample
    pub sampling_lon: f64,
}

impl DemContext {
    pub fn from_source(name: impl Into<String>, source: Arc<dyn ElevationSource>) -> Self {
        let (lat, lon) = source.spacing_deg();
        Self {
            name: name.into(),
            no_data_value: source.no_data_value(),
            sampling_lat: lat.abs().to_radians(),
            sampling_lon: lon.abs().to_radians(),
            source,
        }
    }
}

/// Builds the DEM on first use, exactly once, and hands the same
/// context to every caller afterwards.
pub struct DemProvider {
    selection: DemSelection,
    context: Mutex<Option<Arc<DemContext>>>,
}

impl DemProvider {
    pub fn new(selection: DemSelection) -> Self {
        Self {
            selection,
            context: Mutex::new(None),
        }
    }

    /// Shared DEM context; the first caller constructs it while others wait
    pub fn get_or_init(&self) -> SarResult<Arc<DemContext>> {
        let mut guard = self
            .context
            .lock()
            .map_err(|_| SarError::Processing("DEM provider lock poisoned".to_string()))?;

        if let Some(context) = guard.as_ref() {
            return Ok(Arc::clone(context));
        }

        let context = Arc::new(Self::define_dem(&self.selection)?);
        log::info!(
            "Elevation source '{}' ready (no-data {}, sampling {:.3e} x {:.3e} rad)",
            context.name,
            context.no_data_value,
            context.sampling_lat,
            context.sampling_lon
        );
        *guard = Some(Arc::clone(&context));
        Ok(context)
    }

    fn define_dem(selection: &DemSelection) -> SarResult<DemContext> {
        match selection {
            DemSelection::Builtin {
                name,
                cache_dir,
                auto_download,
            } => {
                let descriptor = ElevationModelRegistry::descriptor(name).ok_or_else(|| {
                    SarError::Config(format!("The DEM '{}' is not supported", name))
                })?;
                let model = descriptor.create_dem(cache_dir, *auto_download)?;
                Ok(DemContext::from_source(descriptor.name, Arc::new(model)))
            }
            DemSelection::External {
                path,
                no_data_value,
            } => {
                let model = RasterElevationModel::from_file(path, *no_data_value).map_err(|e| {
                    SarError::Config(format!(
                        "The DEM '{}' cannot be properly interpreted: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(DemContext::from_source(
                    path.display().to_string(),
                    Arc::new(model),
                ))
            }
            DemSelection::Custom { name, source } => {
                Ok(DemContext::from_source(name.clone(), Arc::clone(source)))
            }
        }
    }
}
