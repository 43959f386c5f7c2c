//! Core compositing modules

pub mod sensor;
pub mod cloud_mask;
pub mod index;
pub mod collection;
pub mod composite;
pub mod region_stats;
pub mod threshold;
pub mod fvc;
pub mod pipeline;

// Re-export main types
pub use sensor::{Satellite, SensorGeneration, BandRole, SensorBandProfile, QA_BAND};
pub use cloud_mask::CloudMaskFilter;
pub use index::{SpectralIndex, SpectralIndexRaster, IndexFormula, compute_scene_indices};
pub use collection::{CollectionFilter, SceneCollection, SceneCollectionBuilder};
pub use composite::{Statistic, TemporalAggregator, TemporalComposite};
pub use region_stats::{Reducer, RegionStats, RegionStatsParams, RegionStatsReducer};
pub use threshold::{ThresholdEstimator, ThresholdMode, ThresholdOutcome, ThresholdPair, ThresholdSource};
pub use fvc::FractionalCoverModel;
pub use pipeline::{BatchReport, PeriodOutcome, PeriodProducts, PipelinePlan, PlanBuilder, Product, ProductRaster};
