//! Common types shared across the prevalence raster crates and services.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod layer;
pub mod nodata;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{RasterError, RasterResult};
pub use grid::{IndexSpace, RasterGrid};
pub use layer::LayerId;
pub use nodata::NoDataRule;
