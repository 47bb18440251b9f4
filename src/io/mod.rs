//! Elevation and raster input

pub mod dem;
pub mod raster;
pub mod srtm;

pub use dem::{
    DemContext, DemProvider, DemSelection, ElevationModelDescriptor, ElevationModelRegistry,
    ElevationSource, RasterElevationModel,
};
pub use raster::{MemoryRaster, RasterSource};
pub use srtm::SrtmElevationModel;
