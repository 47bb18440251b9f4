//! toposub: Topographic Phase Removal for Sentinel-1 Interferograms
//!
//! Simulates the interferometric phase caused by terrain from a DEM and the
//! orbits of both acquisitions, then removes it from each interferogram tile.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types
pub use types::{
    ElevationRange, GeoPoint, GeoPos, LookSide, OrbitData, PixelPos, Polarization, SarComplex,
    SarError, SarResult, StateVector, Window,
};

pub use io::{DemSelection, ElevationSource, MemoryRaster, RasterSource};
pub use crate::core::{
    InterferogramStack, SlcMetadata, TileStack, TopoPhaseConfig, TopoPhaseRemoval,
};
