//! 95% confidence intervals from paired standard-error rasters.

use serde::{Deserialize, Serialize};

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

/// A confidence interval in percent, always within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// `prevalence ± 1.96 × standard_error`, clamped to `[0, 100]`.
///
/// Both inputs are in percent. Standard errors come from sampled cells, so
/// they are positive; negative SE cells are no-data and never reach here.
pub fn compute_ci(prevalence_percent: f64, standard_error_percent: f64) -> ConfidenceInterval {
    let half_width = Z_95 * standard_error_percent;
    ConfidenceInterval {
        lower: (prevalence_percent - half_width).clamp(0.0, 100.0),
        upper: (prevalence_percent + half_width).clamp(0.0, 100.0),
    }
}

/// The filename convention pairing a prevalence raster with its
/// standard-error raster: one token in the URL is swapped for another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeNaming {
    /// Token identifying a prevalence raster, e.g. `_mean`.
    pub prevalence_token: String,
    /// Token that replaces it, e.g. `_SE`.
    pub se_token: String,
}

impl Default for SeNaming {
    fn default() -> Self {
        Self {
            prevalence_token: "_mean".to_string(),
            se_token: "_SE".to_string(),
        }
    }
}

impl SeNaming {
    pub fn new(prevalence_token: impl Into<String>, se_token: impl Into<String>) -> Self {
        Self {
            prevalence_token: prevalence_token.into(),
            se_token: se_token.into(),
        }
    }

    /// URL of the standard-error raster paired with `prevalence_url`.
    ///
    /// The last occurrence of the prevalence token is replaced, so a token
    /// that also appears in a directory name does not interfere. `None`
    /// when the convention does not apply (token absent, or the
    /// substitution leaves the URL unchanged).
    pub fn se_url(&self, prevalence_url: &str) -> Option<String> {
        if self.prevalence_token.is_empty() {
            return None;
        }
        let at = prevalence_url.rfind(&self.prevalence_token)?;
        let mut se_url = String::with_capacity(prevalence_url.len() + self.se_token.len());
        se_url.push_str(&prevalence_url[..at]);
        se_url.push_str(&self.se_token);
        se_url.push_str(&prevalence_url[at + self.prevalence_token.len()..]);

        (se_url != prevalence_url).then_some(se_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ci_typical() {
        let ci = compute_ci(50.0, 5.0);
        assert!((ci.lower - 40.2).abs() < 1e-9);
        assert!((ci.upper - 59.8).abs() < 1e-9);
    }

    #[test]
    fn test_ci_clamped_low() {
        assert_eq!(compute_ci(5.0, 10.0).lower, 0.0);
    }

    #[test]
    fn test_ci_clamped_high() {
        assert_eq!(compute_ci(95.0, 10.0).upper, 100.0);
    }

    #[test]
    fn test_ci_half_width() {
        let ci = compute_ci(30.0, 2.5);
        assert!((ci.lower - 25.1).abs() < 1e-9);
        assert!((ci.upper - 34.9).abs() < 1e-9);
    }

    #[test]
    fn test_ci_zero_se() {
        assert_eq!(compute_ci(50.0, 0.0), ConfidenceInterval { lower: 50.0, upper: 50.0 });
    }

    #[test]
    fn test_se_url_substitution() {
        let naming = SeNaming::default();
        assert_eq!(
            naming.se_url("https://h/rasters/PfPR_2020_mean.tif").as_deref(),
            Some("https://h/rasters/PfPR_2020_SE.tif")
        );
    }

    #[test]
    fn test_se_url_last_occurrence_only() {
        let naming = SeNaming::default();
        assert_eq!(
            naming.se_url("https://h/x_mean/a_mean.tif").as_deref(),
            Some("https://h/x_mean/a_SE.tif")
        );
    }

    #[test]
    fn test_se_url_not_applicable() {
        let naming = SeNaming::default();
        assert_eq!(naming.se_url("https://h/rasters/PfPR_2020.tif"), None);
        assert_eq!(SeNaming::new("_mean", "_mean").se_url("a_mean.tif"), None);
        assert_eq!(SeNaming::new("", "_SE").se_url("a.tif"), None);
    }
}
