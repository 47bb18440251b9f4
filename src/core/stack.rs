//! Interferogram stack layout: acquisitions, image pairs and target bands.

use crate::core::geometry::SlcMetadata;
use crate::core::orbit::OrbitModel;
use crate::io::raster::RasterSource;
use crate::types::{OrbitData, Polarization, SarError, SarResult, Window};
use chrono::NaiveDate;
use ndarray::Array2;
use std::fmt;
use std::sync::Arc;

/// Identity of one acquisition in the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AcquisitionId {
    pub abs_orbit: u32,
    pub date: NaiveDate,
}

impl AcquisitionId {
    pub fn new(abs_orbit: u32, date: NaiveDate) -> Self {
        Self { abs_orbit, date }
    }

    /// Acquisition date as used in band names, e.g. `03Jan2020`
    pub fn date_tag(&self) -> String {
        self.date.format("%d%b%Y").to_string()
    }
}

impl fmt::Display for AcquisitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "orbit {} ({})", self.abs_orbit, self.date_tag())
    }
}

/// Real and imaginary bands of a complex interferogram
#[derive(Clone)]
pub struct ComplexBands {
    pub real: Arc<dyn RasterSource>,
    pub imag: Arc<dyn RasterSource>,
}

impl ComplexBands {
    pub fn new(real: Arc<dyn RasterSource>, imag: Arc<dyn RasterSource>) -> SarResult<Self> {
        if real.dimensions() != imag.dimensions() {
            return Err(SarError::InvalidFormat(format!(
                "Real band is {:?} but imaginary band is {:?}",
                real.dimensions(),
                imag.dimensions()
            )));
        }
        Ok(Self { real, imag })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.real.dimensions()
    }

    pub fn read(&self, window: &Window) -> SarResult<(Array2<f32>, Array2<f32>)> {
        Ok((self.real.read_window(window)?, self.imag.read_window(window)?))
    }
}

impl fmt::Debug for ComplexBands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComplexBands({:?})", self.dimensions())
    }
}

/// Acquisition as supplied by the caller
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub id: AcquisitionId,
    /// `None` for single-polarisation stacks
    pub polarization: Option<Polarization>,
    pub metadata: SlcMetadata,
    pub orbit_data: OrbitData,
    /// Observed interferogram; required for reference acquisitions
    pub bands: Option<ComplexBands>,
}

/// Coregistered stack: reference acquisitions hold the interferogram
/// bands, comparison acquisitions only contribute geometry.
#[derive(Debug, Clone, Default)]
pub struct InterferogramStack {
    pub references: Vec<Acquisition>,
    pub comparisons: Vec<Acquisition>,
}

/// Acquisition with its fitted orbit, shared read-only by all pairs
#[derive(Debug)]
pub struct AcquisitionContext {
    pub id: AcquisitionId,
    pub polarization: Option<Polarization>,
    pub metadata: SlcMetadata,
    pub orbit: OrbitModel,
    pub bands: Option<ComplexBands>,
}

impl AcquisitionContext {
    pub fn new(acquisition: Acquisition, orbit_degree: usize) -> SarResult<Self> {
        let orbit = OrbitModel::fit(&acquisition.orbit_data, orbit_degree)?;
        Ok(Self {
            id: acquisition.id,
            polarization: acquisition.polarization,
            metadata: acquisition.metadata,
            orbit,
            bands: acquisition.bands,
        })
    }

    pub fn bands(&self) -> SarResult<&ComplexBands> {
        self.bands.as_ref().ok_or_else(|| {
            SarError::Config(format!("Acquisition {} has no interferogram bands", self.id))
        })
    }
}

/// Identity of a reference/comparison pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId {
    pub reference: AcquisitionId,
    pub comparison: AcquisitionId,
    pub polarization: Option<Polarization>,
}

impl PairId {
    /// Band name suffix `[_POL]_{referenceDate}_{comparisonDate}`
    pub fn tag(&self) -> String {
        let pol = self
            .polarization
            .map(|p| format!("_{}", p))
            .unwrap_or_default();
        format!(
            "{}_{}_{}",
            pol,
            self.reference.date_tag(),
            self.comparison.date_tag()
        )
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.reference, self.comparison)?;
        if let Some(pol) = self.polarization {
            write!(f, " {}", pol)?;
        }
        Ok(())
    }
}

/// Kind of output band written for every pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BandKind {
    Real,
    Imaginary,
    TopoPhase,
    Elevation,
}

/// Output band of one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetBand {
    pub pair: PairId,
    pub kind: BandKind,
}

impl TargetBand {
    pub fn new(pair: PairId, kind: BandKind) -> Self {
        Self { pair, kind }
    }

    /// Band name, e.g. `i_VV_03Jan2020_15Jan2020`
    pub fn name(&self, topo_phase_band_name: &str) -> String {
        let prefix = match self.kind {
            BandKind::Real => "i",
            BandKind::Imaginary => "q",
            BandKind::TopoPhase => topo_phase_band_name,
            BandKind::Elevation => "elevation",
        };
        format!("{}{}", prefix, self.pair.tag())
    }
}

/// Reference and comparison acquisitions processed together
#[derive(Debug, Clone)]
pub struct ImagePair {
    pub id: PairId,
    pub reference: Arc<AcquisitionContext>,
    pub comparison: Arc<AcquisitionContext>,
}

/// All image pairs of a stack, built once before tiling
#[derive(Debug, Clone)]
pub struct PairingTable {
    pairs: Vec<ImagePair>,
}

impl PairingTable {
    /// Pair every reference with every comparison of the same polarisation.
    ///
    /// Orbits are fitted once per acquisition and shared between pairs.
    pub fn build(stack: InterferogramStack, orbit_degree: usize) -> SarResult<Self> {
        if stack.references.is_empty() {
            return Err(SarError::Config("Stack has no reference acquisition".to_string()));
        }

        let references = stack
            .references
            .into_iter()
            .map(|acq| AcquisitionContext::new(acq, orbit_degree).map(Arc::new))
            .collect::<SarResult<Vec<_>>>()?;
        let comparisons = stack
            .comparisons
            .into_iter()
            .map(|acq| AcquisitionContext::new(acq, orbit_degree).map(Arc::new))
            .collect::<SarResult<Vec<_>>>()?;

        let dimensions = references[0].bands()?.dimensions();
        for reference in &references {
            if reference.bands()?.dimensions() != dimensions {
                return Err(SarError::InvalidFormat(format!(
                    "Reference {} bands are {:?}, expected {:?}",
                    reference.id,
                    reference.bands()?.dimensions(),
                    dimensions
                )));
            }
        }

        let mut pairs = Vec::new();
        for reference in &references {
            for comparison in &comparisons {
                if reference.polarization != comparison.polarization {
                    continue;
                }
                pairs.push(ImagePair {
                    id: PairId {
                        reference: reference.id,
                        comparison: comparison.id,
                        polarization: reference.polarization,
                    },
                    reference: Arc::clone(reference),
                    comparison: Arc::clone(comparison),
                });
            }
        }

        if pairs.is_empty() {
            return Err(SarError::Config(
                "No reference and comparison acquisitions share a polarisation".to_string(),
            ));
        }

        log::info!(
            "Paired {} reference and {} comparison acquisitions into {} interferograms",
            references.len(),
            comparisons.len(),
            pairs.len()
        );

        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[ImagePair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Scene size shared by all reference bands, `(lines, pixels)`
    pub fn dimensions(&self) -> SarResult<(usize, usize)> {
        match self.pairs.first() {
            Some(pair) => Ok(pair.reference.bands()?.dimensions()),
            None => Err(SarError::Config("Pairing table is empty".to_string())),
        }
    }
}
