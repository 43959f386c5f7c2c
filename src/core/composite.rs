use crate::core::index::{SpectralIndex, SpectralIndexRaster};
use crate::types::{CompositeError, CompositeResult, RealImage};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Per-pixel temporal statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Mean,
    Max,
}

impl Statistic {
    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Max => "max",
        }
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Statistic {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Statistic::Mean),
            "max" => Ok(Statistic::Max),
            _ => Err(CompositeError::UnsupportedStatistic(s.to_string())),
        }
    }
}

/// Temporal reduction of an index stack
#[derive(Debug, Clone)]
pub struct TemporalComposite {
    pub index: SpectralIndex,
    pub statistic: Statistic,
    pub data: RealImage,
    /// Number of scenes holding a valid value at each pixel
    pub valid_counts: Array2<u32>,
    pub scene_count: usize,
}

/// Running per-pixel state. Adding rasters and merging partial
/// accumulators are both order independent.
#[derive(Debug, Clone)]
struct Accumulator {
    sum: Array2<f64>,
    count: Array2<u32>,
    max: Array2<f32>,
}

impl Accumulator {
    fn new(dim: (usize, usize)) -> Self {
        Self {
            sum: Array2::zeros(dim),
            count: Array2::zeros(dim),
            max: Array2::from_elem(dim, f32::NEG_INFINITY),
        }
    }

    fn add(mut self, raster: &RealImage) -> Self {
        Zip::from(&mut self.sum)
            .and(&mut self.count)
            .and(&mut self.max)
            .and(raster)
            .for_each(|sum, count, max, &v| {
                if v.is_finite() {
                    *sum += v as f64;
                    *count += 1;
                    if v > *max {
                        *max = v;
                    }
                }
            });
        self
    }

    fn merge(mut self, other: Accumulator) -> Self {
        self.sum += &other.sum;
        self.count += &other.count;
        Zip::from(&mut self.max).and(&other.max).for_each(|a, &b| {
            if b > *a {
                *a = b;
            }
        });
        self
    }

    fn finish(self, statistic: Statistic) -> (RealImage, Array2<u32>) {
        let data = match statistic {
            Statistic::Mean => Zip::from(&self.sum)
                .and(&self.count)
                .map_collect(|&s, &c| if c > 0 { (s / c as f64) as f32 } else { f32::NAN }),
            Statistic::Max => Zip::from(&self.max)
                .and(&self.count)
                .map_collect(|&m, &c| if c > 0 { m } else { f32::NAN }),
        };
        (data, self.count)
    }
}

/// Per-pixel statistical reduction across a scene stack
#[derive(Debug, Clone, Copy)]
pub struct TemporalAggregator {
    statistic: Statistic,
}

impl TemporalAggregator {
    pub fn new(statistic: Statistic) -> Self {
        Self { statistic }
    }

    pub fn statistic(&self) -> Statistic {
        self.statistic
    }

    /// Reduce raw rasters; NaN pixels are excluded from the statistic
    pub fn aggregate_arrays(&self, rasters: &[&RealImage]) -> CompositeResult<(RealImage, Array2<u32>)> {
        let first = rasters
            .first()
            .ok_or_else(|| CompositeError::Processing("No rasters to aggregate".to_string()))?;
        let dim = first.dim();
        if let Some(bad) = rasters.iter().find(|r| r.dim() != dim) {
            return Err(CompositeError::DimensionMismatch {
                expected: dim,
                found: bad.dim(),
            });
        }

        #[cfg(feature = "parallel")]
        let acc = {
            use rayon::prelude::*;
            rasters
                .par_iter()
                .fold(|| Accumulator::new(dim), |acc, r| acc.add(r))
                .reduce(|| Accumulator::new(dim), Accumulator::merge)
        };

        #[cfg(not(feature = "parallel"))]
        let acc = rasters
            .iter()
            .fold(Accumulator::new(dim), |acc, r| acc.add(r));

        Ok(acc.finish(self.statistic))
    }

    /// Reduce the per-scene rasters of one index into a composite
    pub fn aggregate(&self, rasters: &[SpectralIndexRaster]) -> CompositeResult<TemporalComposite> {
        let first = rasters
            .first()
            .ok_or_else(|| CompositeError::Processing("No index rasters to aggregate".to_string()))?;
        let index = first.index;
        if rasters.iter().any(|r| r.index != index) {
            return Err(CompositeError::Processing(
                "Cannot aggregate rasters of different indices".to_string(),
            ));
        }

        log::info!(
            "Aggregating {} {} raster(s) with {}",
            rasters.len(),
            index,
            self.statistic
        );

        let arrays: Vec<&RealImage> = rasters.iter().map(|r| &r.data).collect();
        let (data, valid_counts) = self.aggregate_arrays(&arrays)?;

        Ok(TemporalComposite {
            index,
            statistic: self.statistic,
            data,
            valid_counts,
            scene_count: rasters.len(),
        })
    }
}
