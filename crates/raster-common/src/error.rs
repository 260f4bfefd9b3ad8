//! Error types for raster loading.
//!
//! Only fetch and format failures are errors. Out-of-bounds and no-data
//! pixel queries and a missing confidence interval are `None` results;
//! an unrecognized CRS is a warning.

use thiserror::Error;

/// Result type alias using RasterError.
pub type RasterResult<T> = Result<T, RasterError>;

/// A layer load failure.
///
/// `Clone` so that one in-flight load can report the same failure to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RasterError {
    /// Network or HTTP failure reaching the raster.
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// Unparseable TIFF, unsupported compression or missing geo-referencing.
    #[error("invalid raster format: {0}")]
    Format(String),
}

impl RasterError {
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        RasterError::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        RasterError::Format(message.into())
    }

    /// Human-readable message naming the layer, for the per-layer error state.
    pub fn user_message(&self, layer_name: &str) -> String {
        match self {
            RasterError::Fetch { message, .. } => {
                format!("Could not download layer \"{}\": {}", layer_name, message)
            }
            RasterError::Format(message) => {
                format!("Layer \"{}\" is not a readable GeoTIFF: {}", layer_name, message)
            }
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            RasterError::Fetch { .. } => 502,
            RasterError::Format(_) => 422,
        }
    }
}
