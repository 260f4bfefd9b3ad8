//! Remote Cloud-Optimized GeoTIFF loading.
//!
//! Fetches a TIFF or BigTIFF over HTTP(S), reading the header with a range
//! request first, and decodes the first band together with the
//! geo-referencing tags needed to place it on a map.

pub mod bounds_service;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod georef;
pub mod loader;

pub use bounds_service::BoundsService;
pub use decode::{decode, DecodedTiff, TiffInfo};
pub use error::{LoaderError, Result};
pub use fetch::{FetchConfig, Fetched, RangeFetcher};
pub use loader::{CogImage, CogLoader, LoaderConfig};
