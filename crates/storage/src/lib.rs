//! Layer storage for the prevalence raster engine.
//!
//! Provides:
//! - [`RasterSource`], the load pipeline seam, with the COG-backed [`CogPipeline`]
//! - [`RasterRegistry`], the keyed store of layers that dedupes concurrent loads
//! - [`SeCache`], an LRU side cache of standard-error rasters for interval queries

pub mod error;
pub mod registry;
pub mod se_cache;
pub mod source;

pub use error::{RegistryError, RegistryResult};
pub use registry::{LayerSpec, LayerState, LoadedLayer, RasterLayer, RasterRegistry, VisibleLayer};
pub use se_cache::{SeCache, SeCacheStats};
pub use source::{grid_from_image, CogPipeline, LoadedGrid, RasterSource};
