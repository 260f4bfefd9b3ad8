//! Error types for rendering and encoding.

use raster_common::RasterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pixel buffer has {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("image dimensions {0}x{1} exceed PNG limits")]
    Dimensions(usize, usize),

    #[error("IDAT compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

impl From<RenderError> for RasterError {
    fn from(err: RenderError) -> Self {
        RasterError::format(err.to_string())
    }
}
