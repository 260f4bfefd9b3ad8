//! Error types for COG loading.

use raster_common::RasterError;
use thiserror::Error;

/// Errors raised while fetching or decoding a raster.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("not a TIFF file (leading bytes {0:02x?})")]
    NotTiff(Vec<u8>),

    #[error("tiff decoding failed: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("missing geo-referencing: {0}")]
    MissingGeoreference(String),

    #[error("unsupported raster layout: {0}")]
    Unsupported(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

impl LoaderError {
    pub fn missing_georeference(msg: impl Into<String>) -> Self {
        Self::MissingGeoreference(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Network failures and non-success HTTP statuses.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Status { .. })
    }

    /// Worth retrying: connection problems, timeouts and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<LoaderError> for RasterError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Request { url, source } => RasterError::fetch(url, source.to_string()),
            LoaderError::Status { url, status } => {
                RasterError::fetch(url, format!("HTTP {}", status))
            }
            other => RasterError::format(other.to_string()),
        }
    }
}
