use crate::core::threshold::ThresholdPair;
use crate::types::{CompositeError, CompositeResult, RealImage};

/// Dimidiate pixel model: each pixel is a linear mixture of bare soil
/// and full vegetation endpoints.
#[derive(Debug, Clone, Copy)]
pub struct FractionalCoverModel {
    pair: ThresholdPair,
    span: f64,
}

impl FractionalCoverModel {
    /// Fails with `DegenerateThreshold` when the endpoints coincide
    pub fn new(pair: ThresholdPair) -> CompositeResult<Self> {
        let span = pair.ndvi_veg - pair.ndvi_soil;
        if !span.is_finite() || span.abs() < f64::EPSILON {
            return Err(CompositeError::DegenerateThreshold {
                soil: pair.ndvi_soil,
                veg: pair.ndvi_veg,
            });
        }
        Ok(Self { pair, span })
    }

    pub fn thresholds(&self) -> &ThresholdPair {
        &self.pair
    }

    /// FVC of a single NDVI value, clamped to [0, 1]; NaN stays NaN
    #[inline]
    pub fn cover(&self, ndvi: f32) -> f32 {
        if ndvi.is_nan() {
            return f32::NAN;
        }
        (((ndvi as f64 - self.pair.ndvi_soil) / self.span) as f32).clamp(0.0, 1.0)
    }

    pub fn apply(&self, ndvi: &RealImage) -> RealImage {
        log::info!(
            "Computing FVC with soil={:.4}, veg={:.4}",
            self.pair.ndvi_soil,
            self.pair.ndvi_veg
        );

        #[cfg(feature = "parallel")]
        let fvc = ndarray::Zip::from(ndvi).par_map_collect(|&v| self.cover(v));

        #[cfg(not(feature = "parallel"))]
        let fvc = ndvi.mapv(|v| self.cover(v));

        fvc
    }
}
