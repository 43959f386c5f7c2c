//! Normalized-difference spectral indices
//!
//! One formula `(A - B) / (A + B)` serves every index; which bands feed A
//! and B is a row in [`SpectralIndex::formula`].

use crate::core::cloud_mask::CloudMaskFilter;
use crate::core::sensor::{BandRole, SensorBandProfile};
use crate::io::scene::Scene;
use crate::types::{CompositeError, CompositeResult, DnImage, RealImage, ValidityMask};
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Collection 2 surface reflectance scale factor
pub const REFLECTANCE_SCALE: f32 = 0.000_027_5;
/// Collection 2 surface reflectance offset
pub const REFLECTANCE_OFFSET: f32 = -0.2;

/// Supported normalized-difference indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Normalized Difference Built-up Index
    Ndbi,
    /// Normalized Difference Water Index (McFeeters)
    Ndwi,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 3] = [SpectralIndex::Ndvi, SpectralIndex::Ndbi, SpectralIndex::Ndwi];

    /// Band assignment for the normalized difference
    pub fn formula(&self) -> IndexFormula {
        match self {
            SpectralIndex::Ndvi => IndexFormula::new(BandRole::Nir, BandRole::Red),
            SpectralIndex::Ndbi => IndexFormula::new(BandRole::Swir1, BandRole::Nir),
            SpectralIndex::Ndwi => IndexFormula::new(BandRole::Green, BandRole::Nir),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Ndbi => "NDBI",
            SpectralIndex::Ndwi => "NDWI",
        }
    }
}

impl std::fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NDVI" => Ok(SpectralIndex::Ndvi),
            "NDBI" => Ok(SpectralIndex::Ndbi),
            "NDWI" => Ok(SpectralIndex::Ndwi),
            other => Err(CompositeError::InvalidConfig(format!("Unknown index: {}", other))),
        }
    }
}

/// Index raster for a single scene
#[derive(Debug, Clone)]
pub struct SpectralIndexRaster {
    pub index: SpectralIndex,
    pub scene_id: String,
    pub data: RealImage,
}

/// Convert stored digital numbers to surface reflectance
pub fn rescale_reflectance(dn: &DnImage) -> RealImage {
    dn.mapv(|v| v as f32 * REFLECTANCE_SCALE + REFLECTANCE_OFFSET)
}

/// Normalized difference of one pixel pair, clamped to [-1, 1].
/// Returns NaN when either input is NaN or the sum is zero.
#[inline]
pub fn normalized_difference_pixel(a: f32, b: f32) -> f32 {
    let sum = a + b;
    if !sum.is_finite() || sum == 0.0 {
        return f32::NAN;
    }
    ((a - b) / sum).clamp(-1.0, 1.0)
}

/// Generalized normalized-difference evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFormula {
    pub band_a: BandRole,
    pub band_b: BandRole,
}

impl IndexFormula {
    pub fn new(band_a: BandRole, band_b: BandRole) -> Self {
        Self { band_a, band_b }
    }

    /// Evaluate on two already-rescaled reflectance rasters
    pub fn evaluate(&self, a: &RealImage, b: &RealImage) -> CompositeResult<RealImage> {
        if a.dim() != b.dim() {
            return Err(CompositeError::DimensionMismatch {
                expected: a.dim(),
                found: b.dim(),
            });
        }

        #[cfg(feature = "parallel")]
        let result = Zip::from(a)
            .and(b)
            .par_map_collect(|&a, &b| normalized_difference_pixel(a, b));

        #[cfg(not(feature = "parallel"))]
        let result = Zip::from(a)
            .and(b)
            .map_collect(|&a, &b| normalized_difference_pixel(a, b));

        Ok(result)
    }

    /// Mask, rescale and evaluate against one scene's bands
    pub fn evaluate_scene(
        &self,
        scene: &Scene,
        profile: &SensorBandProfile,
        mask: &ValidityMask,
    ) -> CompositeResult<RealImage> {
        let a = CloudMaskFilter::apply(&rescale_reflectance(scene.band(profile.band(self.band_a))?), mask)?;
        let b = CloudMaskFilter::apply(&rescale_reflectance(scene.band(profile.band(self.band_b))?), mask)?;
        self.evaluate(&a, &b)
    }
}

/// Compute the requested indices for one scene, sharing the cloud mask
pub fn compute_scene_indices(
    scene: &Scene,
    indices: &[SpectralIndex],
) -> CompositeResult<Vec<SpectralIndexRaster>> {
    let profile = SensorBandProfile::for_satellite(scene.satellite);
    let mask = CloudMaskFilter::validity_mask(scene.qa());

    log::debug!(
        "Computing {:?} for scene {} ({:?} profile)",
        indices,
        scene.product_id,
        profile.generation
    );

    indices
        .iter()
        .map(|&index| {
            Ok(SpectralIndexRaster {
                index,
                scene_id: scene.product_id.clone(),
                data: index.formula().evaluate_scene(scene, profile, &mask)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_clamp_after_computation() {
        // Negative reflectance after rescale drives the raw ratio to 1.5
        let a = array![[0.5f32]];
        let b = array![[-0.1f32]];
        let nd = SpectralIndex::Ndvi.formula().evaluate(&a, &b).unwrap();
        assert_eq!(nd[[0, 0]], 1.0);

        let nd = normalized_difference_pixel(-0.1, 0.5);
        assert_eq!(nd, -1.0);
    }

    #[test]
    fn test_zero_sum_has_no_value() {
        assert!(normalized_difference_pixel(0.2, -0.2).is_nan());
        assert!(normalized_difference_pixel(f32::NAN, 0.2).is_nan());
    }

    #[test]
    fn test_output_range() {
        let a = array![[0.3f32, 0.05, 0.9], [0.0, 0.4, 0.25]];
        let b = array![[0.1f32, 0.3, 0.01], [0.2, 0.4, 0.5]];
        let nd = IndexFormula::new(BandRole::Nir, BandRole::Red).evaluate(&a, &b).unwrap();
        assert_abs_diff_eq!(nd[[0, 0]], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(nd[[1, 1]], 0.0, epsilon = 1e-6);
        assert!(nd.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_rescale() {
        let dn = array![[0u16, 10000, 43636]];
        let refl = rescale_reflectance(&dn);
        assert_abs_diff_eq!(refl[[0, 0]], -0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(refl[[0, 1]], 0.075, epsilon = 1e-6);
        assert_abs_diff_eq!(refl[[0, 2]], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_formula_table() {
        assert_eq!(SpectralIndex::Ndvi.formula(), IndexFormula::new(BandRole::Nir, BandRole::Red));
        assert_eq!(SpectralIndex::Ndbi.formula(), IndexFormula::new(BandRole::Swir1, BandRole::Nir));
        assert_eq!(SpectralIndex::Ndwi.formula(), IndexFormula::new(BandRole::Green, BandRole::Nir));
        assert_eq!("ndwi".parse::<SpectralIndex>().unwrap(), SpectralIndex::Ndwi);
    }
}
