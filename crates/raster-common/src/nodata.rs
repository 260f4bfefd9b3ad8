//! No-data detection.
//!
//! The source rasters use `0` as the "outside study area" sentinel, so a
//! cell is no-data when it is NaN, exactly zero, or smaller than 1% of the
//! smallest positive value in the band. A genuine near-zero prevalence is
//! indistinguishable from the sentinel under this rule; that loss is
//! accepted for parity with the published maps.

use serde::{Deserialize, Serialize};

/// Fraction of the minimum positive value below which a sample is no-data.
pub const NODATA_FRACTION: f32 = 0.01;

/// The no-data rule for one band, fixed once the band is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoDataRule {
    /// Samples strictly below this value are no-data.
    pub threshold: f32,
}

impl NoDataRule {
    /// Derive the rule from a band's samples.
    ///
    /// With no positive samples the threshold is 0, so only NaN, zero and
    /// negative values are no-data.
    pub fn from_samples(samples: &[f32]) -> Self {
        let min_positive = samples
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .fold(f32::INFINITY, f32::min);

        let threshold = if min_positive.is_finite() {
            min_positive * NODATA_FRACTION
        } else {
            0.0
        };
        Self { threshold }
    }

    /// Check whether a sample is no-data. Infinities count as no-data too.
    #[inline]
    pub fn is_nodata(&self, value: f32) -> bool {
        !value.is_finite() || value == 0.0 || value < self.threshold
    }

    #[inline]
    pub fn is_valid(&self, value: f32) -> bool {
        !self.is_nodata(value)
    }
}

impl Default for NoDataRule {
    fn default() -> Self {
        Self { threshold: 0.0 }
    }
}
