//! Processing configuration
//!
//! The configuration is plain serde data produced by an external loader.
//! [`ProcessingConfig::into_plan`] validates it, so unknown satellites or
//! statistics are rejected before any imagery is read.

use crate::core::composite::Statistic;
use crate::core::pipeline::{PipelinePlan, Product};
use crate::core::region_stats::RegionStatsParams;
use crate::core::sensor::Satellite;
use crate::core::threshold::{ThresholdEstimator, ThresholdMode, ThresholdPair, DEFAULT_NDVI_SOIL, DEFAULT_NDVI_VEG};
use crate::types::{AreaOfInterest, CloudCoverRange, CompositeError, CompositeResult, DateWindow, Polygon};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodConfig {
    pub start: NaiveDate,
    /// Exclusive
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FvcConfig {
    /// `fixed` or `auto`
    pub mode: String,
    pub ndvi_soil: f64,
    pub ndvi_veg: f64,
    pub min_valid_pixels: usize,
}

impl Default for FvcConfig {
    fn default() -> Self {
        Self {
            mode: "fixed".to_string(),
            ndvi_soil: DEFAULT_NDVI_SOIL,
            ndvi_veg: DEFAULT_NDVI_VEG,
            min_valid_pixels: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Identifier used as the output name prefix
    pub area_id: String,
    /// One switch per satellite identifier, e.g. `"LANDSAT_8": true`
    pub satellites: BTreeMap<String, bool>,
    pub periods: Vec<PeriodConfig>,
    /// `mean` or `max`
    pub statistic: String,
    pub cloud_cover_min: f32,
    pub cloud_cover_max: f32,
    pub products: Vec<String>,
    pub fvc: FvcConfig,
    /// Ground sampling distance for region statistics
    pub scale: f64,
    pub max_pixels: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            area_id: "area".to_string(),
            satellites: Satellite::ALL
                .iter()
                .map(|s| (s.id().to_string(), true))
                .collect(),
            periods: Vec::new(),
            statistic: "mean".to_string(),
            cloud_cover_min: 0.0,
            cloud_cover_max: 100.0,
            products: Product::ALL.iter().map(|p| p.name().to_string()).collect(),
            fvc: FvcConfig::default(),
            scale: 30.0,
            max_pixels: 1_000_000_000,
        }
    }
}

impl ProcessingConfig {
    pub fn from_json_str(json: &str) -> CompositeResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CompositeError::InvalidConfig(format!("Failed to parse configuration: {}", e)))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> CompositeResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CompositeError::InvalidConfig(format!("Cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Enabled satellites; any unknown identifier is an error even when disabled
    pub fn enabled_satellites(&self) -> CompositeResult<BTreeSet<Satellite>> {
        let mut enabled = BTreeSet::new();
        for (id, on) in &self.satellites {
            let satellite: Satellite = id.parse()?;
            if *on {
                enabled.insert(satellite);
            }
        }
        Ok(enabled)
    }

    pub fn statistic(&self) -> CompositeResult<Statistic> {
        self.statistic.parse()
    }

    pub fn threshold_estimator(&self) -> CompositeResult<ThresholdEstimator> {
        let mode = match self.fvc.mode.trim().to_lowercase().as_str() {
            "fixed" => ThresholdMode::Fixed,
            "auto" => ThresholdMode::Auto,
            other => {
                return Err(CompositeError::InvalidConfig(format!(
                    "FVC threshold mode must be 'fixed' or 'auto', got '{}'",
                    other
                )))
            }
        };
        Ok(ThresholdEstimator {
            mode,
            fixed: ThresholdPair {
                ndvi_soil: self.fvc.ndvi_soil,
                ndvi_veg: self.fvc.ndvi_veg,
            },
            region: self.region_params(),
            min_valid_pixels: self.fvc.min_valid_pixels,
        })
    }

    pub fn region_params(&self) -> RegionStatsParams {
        RegionStatsParams {
            scale: self.scale,
            max_pixels: self.max_pixels,
        }
    }

    /// Reject unknown satellites, statistics, products and malformed
    /// parameters without touching any imagery
    pub fn validate(&self) -> CompositeResult<()> {
        self.enabled_satellites()?;
        self.statistic()?;
        CloudCoverRange::new(self.cloud_cover_min, self.cloud_cover_max)?;
        self.threshold_estimator()?;
        for product in &self.products {
            product.parse::<Product>()?;
        }
        for period in &self.periods {
            DateWindow::new(period.start, period.end)?;
        }
        self.region_params().validate()
    }

    /// Validate everything and build the plan for `polygon`
    pub fn into_plan(&self, polygon: Polygon) -> CompositeResult<PipelinePlan> {
        self.validate()?;

        let satellites = self.enabled_satellites()?;
        let statistic = self.statistic()?;
        let cloud_cover = CloudCoverRange::new(self.cloud_cover_min, self.cloud_cover_max)?;
        let thresholds = self.threshold_estimator()?;
        let products = self
            .products
            .iter()
            .map(|p| p.parse::<Product>())
            .collect::<CompositeResult<Vec<_>>>()?;
        let periods = self
            .periods
            .iter()
            .map(|p| DateWindow::new(p.start, p.end))
            .collect::<CompositeResult<Vec<_>>>()?;

        log::debug!(
            "Configuration validated: {} satellite(s), {} period(s), statistic {}",
            satellites.len(),
            periods.len(),
            statistic
        );

        PipelinePlan::builder(AreaOfInterest::new(self.area_id.clone(), polygon))
            .periods(periods)
            .products(products)
            .statistic(statistic)
            .cloud_cover(cloud_cover)
            .satellites(satellites)
            .thresholds(thresholds)
            .region_stats(self.region_params())
            .build()
    }
}
