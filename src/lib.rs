//! landcomp: A Fast, Modular Landsat Spectral Index and Vegetation Cover Compositor
//!
//! This library turns Landsat Collection 2 Level-2 surface reflectance scenes
//! into cloud-masked NDVI, NDBI and NDWI temporal composites and derives
//! fractional vegetation cover (FVC) from the NDVI composite.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod bindings;

// Re-export main types and functions for easier access
pub use types::{
    AreaOfInterest, BoundingBox, CloudCoverRange, CompositeError, CompositeResult, DateWindow,
    GeoTransform, Polygon, RasterGrid, RealImage,
};

pub use config::ProcessingConfig;
pub use core::{BatchReport, PeriodOutcome, PipelinePlan, Product, Satellite, SpectralIndex, Statistic};
pub use io::{InMemoryArchive, Scene, SceneArchive};
