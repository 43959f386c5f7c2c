use crate::types::{BoundingBox, CompositeError, CompositeResult, Polygon, RasterGrid, RealImage};
use geo::{Contains, Point};
use serde::{Deserialize, Serialize};

/// Scalar reduction applied over a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reducer {
    Mean,
    Max,
    /// Percentiles in the range 0..=100
    Percentiles(Vec<f64>),
}

/// Sampling parameters for region reductions
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionStatsParams {
    /// Ground sampling distance of the reduction, in grid units
    pub scale: f64,
    /// Maximum number of samples before switching to a coarser grid
    pub max_pixels: u64,
}

impl RegionStatsParams {
    /// Scale must be finite and positive, the budget at least one sample
    pub fn validate(&self) -> CompositeResult<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(CompositeError::InvalidConfig(format!(
                "Reduction scale must be finite and positive, got {}",
                self.scale
            )));
        }
        if self.max_pixels == 0 {
            return Err(CompositeError::InvalidConfig(
                "Pixel budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RegionStatsParams {
    fn default() -> Self {
        Self {
            scale: 30.0,        // Landsat native resolution
            max_pixels: 1_000_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReducerOutput {
    Mean(Option<f64>),
    Max(Option<f64>),
    Percentiles(Vec<(f64, Option<f64>)>),
}

/// Result of a region reduction
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStats {
    pub output: ReducerOutput,
    /// Valid samples that contributed
    pub sample_count: usize,
    /// Sampling distance actually used
    pub effective_scale: f64,
    /// True when the pixel budget forced a coarser sampling grid
    pub approximate: bool,
}

impl RegionStats {
    /// Scalar for mean/max reductions
    pub fn value(&self) -> Option<f64> {
        match &self.output {
            ReducerOutput::Mean(v) | ReducerOutput::Max(v) => *v,
            ReducerOutput::Percentiles(_) => None,
        }
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        match &self.output {
            ReducerOutput::Percentiles(values) => values
                .iter()
                .find(|(q, _)| (q - p).abs() < 1e-9)
                .and_then(|(_, v)| *v),
            _ => None,
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
/// `sorted` must be ascending and free of NaN.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Spatial scalar aggregation over a polygon at a fixed sampling distance
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionStatsReducer {
    params: RegionStatsParams,
}

impl RegionStatsReducer {
    pub fn new(params: RegionStatsParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RegionStatsParams {
        &self.params
    }

    pub fn reduce(
        &self,
        data: &RealImage,
        grid: &RasterGrid,
        polygon: &Polygon,
        reducer: &Reducer,
    ) -> CompositeResult<RegionStats> {
        if data.dim() != grid.dim() {
            return Err(CompositeError::DimensionMismatch {
                expected: grid.dim(),
                found: data.dim(),
            });
        }
        self.params.validate()?;
        if let Reducer::Percentiles(ps) = reducer {
            if let Some(p) = ps.iter().find(|p| !(0.0..=100.0).contains(*p)) {
                return Err(CompositeError::InvalidConfig(format!(
                    "Percentile {} outside 0..=100",
                    p
                )));
            }
        }

        let (scale, approximate) = self.effective_scale(polygon);
        if approximate {
            log::warn!(
                "Region exceeds {} pixel budget at scale {}; using approximate scale {}",
                self.params.max_pixels,
                self.params.scale,
                scale
            );
        }

        let samples = sample_region(data, grid, polygon, scale);
        log::debug!("Region reduction over {} valid sample(s) at scale {}", samples.len(), scale);

        let output = match reducer {
            Reducer::Mean => ReducerOutput::Mean(if samples.is_empty() {
                None
            } else {
                Some(samples.iter().sum::<f64>() / samples.len() as f64)
            }),
            Reducer::Max => ReducerOutput::Max(samples.iter().copied().reduce(f64::max)),
            Reducer::Percentiles(ps) => {
                let mut sorted = samples.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                ReducerOutput::Percentiles(ps.iter().map(|&p| (p, percentile_sorted(&sorted, p))).collect())
            }
        };

        Ok(RegionStats {
            output,
            sample_count: samples.len(),
            effective_scale: scale,
            approximate,
        })
    }

    /// Coarsen the sampling grid by doubling until the candidate count fits the budget
    fn effective_scale(&self, polygon: &Polygon) -> (f64, bool) {
        let mut scale = self.params.scale;
        let mut approximate = false;
        while scale.is_finite() && candidate_count(polygon, scale) > self.params.max_pixels {
            scale *= 2.0;
            approximate = true;
        }
        (scale, approximate)
    }
}

/// Sample grid rows and columns. Float to integer casts saturate, so an
/// extent too large for `u64` reports `u64::MAX`.
fn sample_dims(polygon: &Polygon, scale: f64) -> (u64, u64) {
    let bbox = BoundingBox::of_polygon(polygon);
    if !(bbox.width() >= 0.0 && bbox.height() >= 0.0) {
        return (0, 0);
    }
    let rows = (bbox.height() / scale).ceil().max(1.0) as u64;
    let cols = (bbox.width() / scale).ceil().max(1.0) as u64;
    (rows, cols)
}

/// Overflow counts as over any budget
fn candidate_count(polygon: &Polygon, scale: f64) -> u64 {
    let (rows, cols) = sample_dims(polygon, scale);
    rows.saturating_mul(cols)
}

/// Valid raster values at sample points spaced `scale` apart inside the polygon
fn sample_region(data: &RealImage, grid: &RasterGrid, polygon: &Polygon, scale: f64) -> Vec<f64> {
    let bbox = BoundingBox::of_polygon(polygon);
    let (rows, cols) = sample_dims(polygon, scale);
    let (rows, cols) = (rows as usize, cols as usize);

    let sample_row = |r: usize| -> Vec<f64> {
        let y = bbox.max_y - (r as f64 + 0.5) * scale;
        (0..cols)
            .filter_map(|c| {
                let x = bbox.min_x + (c as f64 + 0.5) * scale;
                if !polygon.contains(&Point::new(x, y)) {
                    return None;
                }
                let (row, col) = grid.pixel_at(x, y)?;
                let v = data[[row, col]];
                v.is_finite().then_some(v as f64)
            })
            .collect()
    };

    #[cfg(feature = "parallel")]
    let samples: Vec<f64> = {
        use rayon::prelude::*;
        (0..rows).into_par_iter().flat_map_iter(sample_row).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let samples: Vec<f64> = (0..rows).flat_map(sample_row).collect();

    samples
}
