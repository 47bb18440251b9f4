//! Core topographic phase processing modules

pub mod geometry;
pub mod orbit;
pub mod height_range;
pub mod dem_tile;
pub mod topo_phase;
pub mod stack;
pub mod topo_removal;

// Re-export main types
pub use geometry::SlcMetadata;
pub use orbit::{OrbitModel, RadarCoordinate};
pub use height_range::{distribute_points, estimate_height_range};
pub use dem_tile::{build_dem_tile, extend_footprint, DemFootprint, DemTile};
pub use topo_phase::{synthesize, TopoPhase, TopoPhaseResult};
pub use stack::{
    Acquisition, AcquisitionContext, AcquisitionId, BandKind, ComplexBands, ImagePair,
    InterferogramStack, PairId, PairingTable, TargetBand,
};
pub use topo_removal::{
    apply_correction, subtract_topo_phase, DemCoverage, SceneOutput, TileStack, TopoPhaseConfig,
    TopoPhaseRemoval,
};
