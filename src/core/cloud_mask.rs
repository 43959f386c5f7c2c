use crate::types::{CompositeError, CompositeResult, QaImage, RealImage, ValidityMask};
use ndarray::Zip;

/// QA_PIXEL bit flagging cloud shadow
pub const CLOUD_SHADOW_BIT: u16 = 3;
/// QA_PIXEL bit flagging cloud
pub const CLOUD_BIT: u16 = 4;

const REJECT_BITS: u16 = (1 << CLOUD_SHADOW_BIT) | (1 << CLOUD_BIT);

/// Derives pixel validity from the QA_PIXEL band
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudMaskFilter;

impl CloudMaskFilter {
    /// A QA value is valid unless the cloud or cloud-shadow bit is set
    #[inline]
    pub fn is_valid(qa: u16) -> bool {
        qa & REJECT_BITS == 0
    }

    /// Build the validity mask for a whole QA band
    pub fn validity_mask(qa: &QaImage) -> ValidityMask {
        let mask = qa.mapv(Self::is_valid);

        let total = mask.len();
        if total > 0 {
            let rejected = mask.iter().filter(|v| !**v).count();
            log::debug!(
                "Cloud mask: {}/{} pixels rejected ({:.1}%)",
                rejected,
                total,
                100.0 * rejected as f64 / total as f64
            );
        }

        mask
    }

    /// Mark every masked pixel of `data` as having no value
    pub fn apply(data: &RealImage, mask: &ValidityMask) -> CompositeResult<RealImage> {
        if data.dim() != mask.dim() {
            return Err(CompositeError::DimensionMismatch {
                expected: data.dim(),
                found: mask.dim(),
            });
        }

        Ok(Zip::from(data)
            .and(mask)
            .map_collect(|&v, &valid| if valid { v } else { f32::NAN }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cloud_and_shadow_bits() {
        assert!(!CloudMaskFilter::is_valid(0b11000));
        assert!(!CloudMaskFilter::is_valid(0b01000));
        assert!(!CloudMaskFilter::is_valid(0b10000));
        assert!(CloudMaskFilter::is_valid(0b00001));
        // Clear-sky land with high-confidence bits elsewhere stays valid
        assert!(CloudMaskFilter::is_valid(21824));
    }

    #[test]
    fn test_mask_application() {
        let qa = array![[0b00001u16, 0b11000], [0b01000, 0]];
        let mask = CloudMaskFilter::validity_mask(&qa);
        assert_eq!(mask, array![[true, false], [false, true]]);

        let data = array![[0.1f32, 0.2], [0.3, 0.4]];
        let masked = CloudMaskFilter::apply(&data, &mask).unwrap();
        assert_eq!(masked[[0, 0]], 0.1);
        assert!(masked[[0, 1]].is_nan());
        assert!(masked[[1, 0]].is_nan());
        assert_eq!(masked[[1, 1]], 0.4);
    }
}
