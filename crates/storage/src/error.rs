//! Registry error types.

use raster_common::{LayerId, RasterError};
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("layer not found: {0}")]
    NotFound(LayerId),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl RegistryError {
    pub fn http_status_code(&self) -> u16 {
        match self {
            RegistryError::NotFound(_) => 404,
            RegistryError::Raster(e) => e.http_status_code(),
        }
    }
}
