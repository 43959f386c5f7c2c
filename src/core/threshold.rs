use crate::core::region_stats::{Reducer, RegionStatsParams, RegionStatsReducer};
use crate::types::{AreaOfInterest, CompositeError, CompositeResult, RasterGrid, RealImage};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NDVI_SOIL: f64 = 0.2;
pub const DEFAULT_NDVI_VEG: f64 = 0.86;

/// Percentiles used as bare-soil and full-vegetation endpoints
pub const SOIL_PERCENTILE: f64 = 5.0;
pub const VEG_PERCENTILE: f64 = 95.0;

/// Bare-soil and full-vegetation NDVI endpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub ndvi_soil: f64,
    pub ndvi_veg: f64,
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self {
            ndvi_soil: DEFAULT_NDVI_SOIL,
            ndvi_veg: DEFAULT_NDVI_VEG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    Fixed,
    Auto,
}

/// Where the endpoints used for a period came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdSource {
    Fixed,
    Estimated,
    /// Automatic estimation failed and the fixed pair was used
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdOutcome {
    pub pair: ThresholdPair,
    pub source: ThresholdSource,
    /// Percentiles came from a budget-limited reduction
    pub approximate: bool,
}

/// Estimator configuration
#[derive(Debug, Clone, Copy)]
pub struct ThresholdEstimator {
    pub mode: ThresholdMode,
    pub fixed: ThresholdPair,
    pub region: RegionStatsParams,
    /// Minimum valid samples required for percentile estimation
    pub min_valid_pixels: usize,
}

impl Default for ThresholdEstimator {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::Fixed,
            fixed: ThresholdPair::default(),
            region: RegionStatsParams::default(),
            min_valid_pixels: 10,
        }
    }
}

impl ThresholdEstimator {
    pub fn fixed(pair: ThresholdPair) -> Self {
        Self {
            mode: ThresholdMode::Fixed,
            fixed: pair,
            ..Self::default()
        }
    }

    pub fn automatic(region: RegionStatsParams) -> Self {
        Self {
            mode: ThresholdMode::Auto,
            region,
            ..Self::default()
        }
    }

    /// 5th/95th percentiles of `composite` inside the AOI bounding box
    pub fn estimate(
        &self,
        composite: &RealImage,
        grid: &RasterGrid,
        aoi: &AreaOfInterest,
    ) -> CompositeResult<(ThresholdPair, bool)> {
        let bbox = aoi.bounding_box().to_polygon();
        let stats = RegionStatsReducer::new(self.region).reduce(
            composite,
            grid,
            &bbox,
            &Reducer::Percentiles(vec![SOIL_PERCENTILE, VEG_PERCENTILE]),
        )?;

        if stats.sample_count < self.min_valid_pixels {
            return Err(CompositeError::ThresholdEstimationFailed(format!(
                "{} valid pixel(s) in AOI bounds, need at least {}",
                stats.sample_count, self.min_valid_pixels
            )));
        }

        match (stats.percentile(SOIL_PERCENTILE), stats.percentile(VEG_PERCENTILE)) {
            (Some(ndvi_soil), Some(ndvi_veg)) => {
                log::info!(
                    "Estimated FVC endpoints: soil={:.4}, veg={:.4}{}",
                    ndvi_soil,
                    ndvi_veg,
                    if stats.approximate { " (approximate)" } else { "" }
                );
                Ok((ThresholdPair { ndvi_soil, ndvi_veg }, stats.approximate))
            }
            _ => Err(CompositeError::ThresholdEstimationFailed(
                "Percentile reduction returned no value".to_string(),
            )),
        }
    }

    /// Endpoints for one period. Estimation failure never propagates:
    /// the fixed pair is used and a warning logged.
    pub fn resolve(&self, composite: &RealImage, grid: &RasterGrid, aoi: &AreaOfInterest) -> ThresholdOutcome {
        match self.mode {
            ThresholdMode::Fixed => ThresholdOutcome {
                pair: self.fixed,
                source: ThresholdSource::Fixed,
                approximate: false,
            },
            ThresholdMode::Auto => match self.estimate(composite, grid, aoi) {
                Ok((pair, approximate)) => ThresholdOutcome {
                    pair,
                    source: ThresholdSource::Estimated,
                    approximate,
                },
                Err(e) => {
                    log::warn!(
                        "{}; falling back to soil={}, veg={}",
                        e,
                        self.fixed.ndvi_soil,
                        self.fixed.ndvi_veg
                    );
                    ThresholdOutcome {
                        pair: self.fixed,
                        source: ThresholdSource::Fallback,
                        approximate: false,
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, GeoTransform, Polygon};
    use approx::assert_abs_diff_eq;
    use geo::LineString;
    use ndarray::Array2;

    fn grid() -> RasterGrid {
        RasterGrid::new(GeoTransform::north_up(0.0, 3000.0, 30.0), 100, 100)
    }

    #[test]
    fn test_fixed_mode_returns_pair_unchanged() {
        let pair = ThresholdPair { ndvi_soil: 0.1, ndvi_veg: 0.7 };
        let aoi = AreaOfInterest::new("a", grid().bounds().to_polygon());
        let outcome = ThresholdEstimator::fixed(pair).resolve(&Array2::zeros((100, 100)), &grid(), &aoi);
        assert_eq!(outcome.pair, pair);
        assert_eq!(outcome.source, ThresholdSource::Fixed);
        assert_eq!(ThresholdPair::default(), ThresholdPair { ndvi_soil: 0.2, ndvi_veg: 0.86 });
    }

    #[test]
    fn test_auto_recovers_uniform_percentiles() {
        // Uniform on [-0.2, 0.8]
        let data = Array2::from_shape_fn((100, 100), |(r, c)| -0.2 + (r * 100 + c) as f32 / 9999.0);
        // Triangle AOI: its bounding box still covers the whole raster
        let aoi = AreaOfInterest::new(
            "tri",
            Polygon::new(LineString::from(vec![(0.0, 0.0), (3000.0, 0.0), (3000.0, 3000.0)]), vec![]),
        );
        let outcome = ThresholdEstimator::automatic(RegionStatsParams::default()).resolve(&data, &grid(), &aoi);

        assert_eq!(outcome.source, ThresholdSource::Estimated);
        assert_abs_diff_eq!(outcome.pair.ndvi_soil, -0.15, epsilon = 1e-3);
        assert_abs_diff_eq!(outcome.pair.ndvi_veg, 0.75, epsilon = 1e-3);
    }

    #[test]
    fn test_auto_falls_back_when_too_few_pixels() {
        let mut data = Array2::from_elem((100, 100), f32::NAN);
        data[[0, 0]] = 0.5;
        data[[1, 1]] = 0.6;
        let aoi = AreaOfInterest::new("a", BoundingBox::new(0.0, 0.0, 3000.0, 3000.0).to_polygon());

        let estimator = ThresholdEstimator::automatic(RegionStatsParams::default());
        let err = estimator.estimate(&data, &grid(), &aoi).unwrap_err();
        assert!(matches!(err, CompositeError::ThresholdEstimationFailed(_)));
        assert!(err.is_soft());

        let outcome = estimator.resolve(&data, &grid(), &aoi);
        assert_eq!(outcome.source, ThresholdSource::Fallback);
        assert_eq!(outcome.pair, ThresholdPair::default());
    }
}
