//! Removal of the simulated topographic phase from interferogram tiles.

use crate::core::dem_tile::{build_dem_tile, DemTile};
use crate::core::stack::{BandKind, ImagePair, InterferogramStack, PairingTable, TargetBand};
use crate::core::topo_phase::{synthesize, TopoPhaseResult};
use crate::io::dem::{DemContext, DemProvider, DemSelection};
use crate::types::{SarComplex, SarError, SarResult, Window};
use ndarray::{s, Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Topographic phase removal parameters.
///
/// Serialises to the `<parameters>` block of a processing graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename = "parameters", rename_all = "camelCase")]
pub struct TopoPhaseConfig {
    /// Orbit polynomial degree, 2 to 10
    pub orbit_degree: usize,
    /// Built-in DEM, ignored when an external file is given
    pub dem_name: String,
    #[serde(rename = "externalDEMFile", skip_serializing_if = "Option::is_none")]
    pub external_dem_file: Option<PathBuf>,
    #[serde(rename = "externalDEMNoDataValue")]
    pub external_dem_no_data_value: f64,
    /// Integer percentage used both to grow the height sampling window
    /// and to scale the sampled maximum height
    pub tile_extension_percent: String,
    pub topo_phase_band_name: String,
    pub output_elevation: bool,
    /// Root of the DEM tile cache, platform cache directory when unset
    #[serde(rename = "demCacheDir", skip_serializing_if = "Option::is_none")]
    pub dem_cache_dir: Option<PathBuf>,
    #[serde(rename = "autoDownloadDEM")]
    pub auto_download_dem: bool,
}

impl Default for TopoPhaseConfig {
    fn default() -> Self {
        Self {
            orbit_degree: 3,
            dem_name: "SRTM 3Sec".to_string(),
            external_dem_file: None,
            external_dem_no_data_value: 0.0,
            tile_extension_percent: "100".to_string(),
            topo_phase_band_name: "topo_phase".to_string(),
            output_elevation: false,
            dem_cache_dir: None,
            auto_download_dem: false,
        }
    }
}

impl TopoPhaseConfig {
    /// Read and validate graph node parameters
    pub fn from_xml(xml: &str) -> SarResult<Self> {
        let config: Self = quick_xml::de::from_str(xml)
            .map_err(|e| SarError::Config(format!("Failed to parse parameters: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_xml(&self) -> SarResult<String> {
        quick_xml::se::to_string(self)
            .map_err(|e| SarError::Config(format!("Failed to write parameters: {}", e)))
    }

    pub fn validate(&self) -> SarResult<()> {
        if !(2..=10).contains(&self.orbit_degree) {
            return Err(SarError::Config(format!(
                "Orbit interpolation degree must be between 2 and 10, got {}",
                self.orbit_degree
            )));
        }
        if self.topo_phase_band_name.is_empty() {
            return Err(SarError::Config("Topographic phase band name is empty".to_string()));
        }
        self.extension_percent()?;
        Ok(())
    }

    /// Tile extension percentage as a non-negative integer
    pub fn extension_percent(&self) -> SarResult<u32> {
        self.tile_extension_percent.trim().parse::<u32>().map_err(|e| {
            SarError::Config(format!(
                "Invalid tile extension percentage '{}': {}",
                self.tile_extension_percent, e
            ))
        })
    }

    /// Elevation source chosen by this configuration
    pub fn dem_selection(&self) -> SarResult<DemSelection> {
        if let Some(path) = &self.external_dem_file {
            return Ok(DemSelection::External {
                path: path.clone(),
                no_data_value: self.external_dem_no_data_value,
            });
        }

        let cache_dir = match &self.dem_cache_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .map(|dir| dir.join("toposub").join("dem"))
                .ok_or_else(|| {
                    SarError::Config("No DEM cache directory configured".to_string())
                })?,
        };

        Ok(DemSelection::Builtin {
            name: self.dem_name.clone(),
            cache_dir,
            auto_download: self.auto_download_dem,
        })
    }
}

/// Rotate an interferogram by `-phase`: `(real + j imag) * exp(-j phase)`
pub fn subtract_topo_phase(
    real: &Array2<f32>,
    imag: &Array2<f32>,
    phase: &Array2<f64>,
) -> SarResult<(Array2<f32>, Array2<f32>)> {
    if real.dim() != imag.dim() || real.dim() != phase.dim() {
        return Err(SarError::Processing(format!(
            "Shape mismatch: real {:?}, imaginary {:?}, phase {:?}",
            real.dim(),
            imag.dim(),
            phase.dim()
        )));
    }

    let mut out_real = Array2::zeros(real.dim());
    let mut out_imag = Array2::zeros(real.dim());

    Zip::from(&mut out_real)
        .and(&mut out_imag)
        .and(real)
        .and(imag)
        .and(phase)
        .for_each(|o_re, o_im, &re, &im, &phi| {
            let corrected = SarComplex::new(re as f64, im as f64) * SarComplex::from_polar(1.0, phi).conj();
            *o_re = corrected.re as f32;
            *o_im = corrected.im as f32;
        });

    Ok((out_real, out_imag))
}

/// Correct the cells the simulation reached; the rest keep the observed value
pub fn apply_correction(
    real: &Array2<f32>,
    imag: &Array2<f32>,
    topo: &TopoPhaseResult,
) -> SarResult<(Array2<f32>, Array2<f32>)> {
    let (mut out_real, mut out_imag) = subtract_topo_phase(real, imag, &topo.phase)?;

    Zip::from(&mut out_real)
        .and(&mut out_imag)
        .and(real)
        .and(imag)
        .and(&topo.valid)
        .for_each(|o_re, o_im, &re, &im, &valid| {
            if !valid {
                *o_re = re;
                *o_im = im;
            }
        });

    Ok((out_real, out_imag))
}

/// Whether a DEM tile could be built for a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemCoverage {
    /// Phase was simulated and removed
    Covered,
    /// No DEM coverage: I/Q passed through, phase and elevation set to no-data
    None,
}

/// All target bands of one window
#[derive(Debug, Clone)]
pub struct TileStack {
    pub window: Window,
    pub coverage: DemCoverage,
    pub bands: HashMap<TargetBand, Array2<f32>>,
}

/// Full-scene rasters assembled from all tiles
#[derive(Debug, Clone)]
pub struct SceneOutput {
    pub bands: HashMap<TargetBand, Array2<f32>>,
    pub tiles_processed: usize,
    /// Tiles passed through for lack of DEM coverage
    pub uncovered_tiles: Vec<Window>,
    /// Tiles whose computation failed, filled with no-data
    pub failed_tiles: Vec<(Window, String)>,
}

/// Operator removing the topographic phase from every pair of a stack
pub struct TopoPhaseRemoval {
    config: TopoPhaseConfig,
    extension_percent: u32,
    pairs: PairingTable,
    dem: DemProvider,
    target_bands: Vec<TargetBand>,
}

impl TopoPhaseRemoval {
    /// Validate the configuration and pair the stack; the DEM itself is
    /// defined on first use
    pub fn new(config: TopoPhaseConfig, stack: InterferogramStack) -> SarResult<Self> {
        config.validate()?;
        let selection = config.dem_selection()?;
        Self::with_dem(config, stack, selection)
    }

    /// Like [`TopoPhaseRemoval::new`] with an explicit elevation source
    pub fn with_dem(
        config: TopoPhaseConfig,
        stack: InterferogramStack,
        selection: DemSelection,
    ) -> SarResult<Self> {
        config.validate()?;
        let extension_percent = config.extension_percent()?;
        let pairs = PairingTable::build(stack, config.orbit_degree)?;

        let mut kinds = vec![BandKind::Real, BandKind::Imaginary, BandKind::TopoPhase];
        if config.output_elevation {
            kinds.push(BandKind::Elevation);
        }
        let target_bands = pairs
            .pairs()
            .iter()
            .flat_map(|pair| kinds.iter().map(move |&kind| TargetBand::new(pair.id, kind)))
            .collect();

        log::info!("Topographic phase removal using DEM {:?}", selection);

        Ok(Self {
            config,
            extension_percent,
            pairs,
            dem: DemProvider::new(selection),
            target_bands,
        })
    }

    pub fn config(&self) -> &TopoPhaseConfig {
        &self.config
    }

    pub fn pairs(&self) -> &PairingTable {
        &self.pairs
    }

    pub fn target_bands(&self) -> &[TargetBand] {
        &self.target_bands
    }

    pub fn band_name(&self, band: &TargetBand) -> String {
        band.name(&self.config.topo_phase_band_name)
    }

    /// Define the DEM now instead of on the first tile
    pub fn initialise_dem(&self) -> SarResult<Arc<DemContext>> {
        self.dem.get_or_init()
    }

    /// Compute every target band over `window`.
    ///
    /// The DEM tile is built once from the first pair's reference geometry
    /// and shared by all pairs.
    pub fn compute_tile_stack(&self, window: &Window) -> SarResult<TileStack> {
        let dem = self.dem.get_or_init()?;
        let first = self
            .pairs
            .pairs()
            .first()
            .ok_or_else(|| SarError::Config("No image pairs to process".to_string()))?;

        let dem_tile = build_dem_tile(
            window,
            &first.reference.metadata,
            &first.reference.orbit,
            &dem,
            self.extension_percent,
        )
        .map_err(|e| SarError::Synthesis {
            pair: first.id.to_string(),
            window: *window,
            reason: e.to_string(),
        })?;

        let coverage = match dem_tile {
            Some(_) => DemCoverage::Covered,
            None => DemCoverage::None,
        };

        let mut bands = HashMap::with_capacity(self.target_bands.len());
        for pair in self.pairs.pairs() {
            let (real, imag) = pair
                .reference
                .bands()
                .and_then(|bands| bands.read(window))
                .map_err(|e| SarError::BandRead {
                    pair: pair.id.to_string(),
                    window: *window,
                    reason: e.to_string(),
                })?;
            let pair_bands = match &dem_tile {
                Some(tile) => self.correct_pair(pair, window, tile, real, imag)?,
                None => self.pass_through(real, imag, dem.no_data_value),
            };
            for (kind, raster) in pair_bands {
                bands.insert(TargetBand::new(pair.id, kind), raster);
            }
        }

        Ok(TileStack {
            window: *window,
            coverage,
            bands,
        })
    }

    fn correct_pair(
        &self,
        pair: &ImagePair,
        window: &Window,
        dem_tile: &DemTile,
        real: Array2<f32>,
        imag: Array2<f32>,
    ) -> SarResult<Vec<(BandKind, Array2<f32>)>> {
        let topo = synthesize(
            &pair.reference.metadata,
            &pair.reference.orbit,
            &pair.comparison.metadata,
            &pair.comparison.orbit,
            window,
            dem_tile,
            self.config.output_elevation,
        )
        .map_err(|e| SarError::Synthesis {
            pair: pair.id.to_string(),
            window: *window,
            reason: e.to_string(),
        })?;

        let (corrected_real, corrected_imag) = apply_correction(&real, &imag, &topo)?;

        let mut bands = vec![
            (BandKind::Real, corrected_real),
            (BandKind::Imaginary, corrected_imag),
            (BandKind::TopoPhase, topo.phase.mapv(|p| p as f32)),
        ];
        if let Some(elevation) = topo.elevation {
            bands.push((BandKind::Elevation, elevation.mapv(|h| h as f32)));
        }
        Ok(bands)
    }

    fn pass_through(
        &self,
        real: Array2<f32>,
        imag: Array2<f32>,
        no_data_value: f64,
    ) -> Vec<(BandKind, Array2<f32>)> {
        let fill = Array2::from_elem(real.dim(), no_data_value as f32);
        let mut bands = vec![
            (BandKind::Real, real),
            (BandKind::Imaginary, imag),
            (BandKind::TopoPhase, fill.clone()),
        ];
        if self.config.output_elevation {
            bands.push((BandKind::Elevation, fill));
        }
        bands
    }

    /// Process the whole scene in tiles of `tile_size` x `tile_size`.
    ///
    /// Tiles run concurrently with the `parallel` feature. A failing tile
    /// does not stop the others; it is filled with no-data and reported.
    pub fn process_scene(&self, tile_size: usize) -> SarResult<SceneOutput> {
        if tile_size == 0 {
            return Err(SarError::Config("Tile size must be positive".to_string()));
        }

        let (lines, pixels) = self.pairs.dimensions()?;
        let dem = self.initialise_dem()?;

        let windows: Vec<Window> = (0..lines)
            .step_by(tile_size)
            .flat_map(|y| {
                (0..pixels).step_by(tile_size).map(move |x| {
                    Window::from_rect(
                        x as i64,
                        y as i64,
                        tile_size.min(pixels - x),
                        tile_size.min(lines - y),
                    )
                })
            })
            .collect();

        log::info!(
            "Processing {} x {} scene in {} tiles for {} pairs",
            lines,
            pixels,
            windows.len(),
            self.pairs.len()
        );

        #[cfg(feature = "parallel")]
        let results: Vec<(Window, SarResult<TileStack>)> = {
            use rayon::prelude::*;
            windows
                .into_par_iter()
                .map(|window| (window, self.compute_tile_stack(&window)))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let results: Vec<(Window, SarResult<TileStack>)> = windows
            .into_iter()
            .map(|window| (window, self.compute_tile_stack(&window)))
            .collect();

        let no_data = dem.no_data_value as f32;
        let mut bands: HashMap<TargetBand, Array2<f32>> = self
            .target_bands
            .iter()
            .map(|&band| (band, Array2::from_elem((lines, pixels), no_data)))
            .collect();

        let tiles_processed = results.len();
        let mut uncovered_tiles = Vec::new();
        let mut failed_tiles = Vec::new();

        for (window, result) in results {
            match result {
                Ok(tile) => {
                    if tile.coverage == DemCoverage::None {
                        uncovered_tiles.push(window);
                    }
                    let rows = window.line_lo as usize..=window.line_hi as usize;
                    let cols = window.pixel_lo as usize..=window.pixel_hi as usize;
                    for (band, raster) in tile.bands {
                        if let Some(full) = bands.get_mut(&band) {
                            full.slice_mut(s![rows.clone(), cols.clone()]).assign(&raster);
                        }
                    }
                }
                Err(e) => {
                    log::error!("Tile {} failed: {}", window, e);
                    failed_tiles.push((window, e.to_string()));
                }
            }
        }

        log::info!(
            "Scene done: {} tiles, {} without DEM coverage, {} failed",
            tiles_processed,
            uncovered_tiles.len(),
            failed_tiles.len()
        );

        Ok(SceneOutput {
            bands,
            tiles_processed,
            uncovered_tiles,
            failed_tiles,
        })
    }
}
