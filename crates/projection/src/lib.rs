//! Coordinate reference system handling for prevalence rasters.
//!
//! Implements the spherical Web Mercator projection from scratch and the
//! normalization of native raster bounds into WGS84 degrees.

pub mod geokeys;
pub mod mercator;
pub mod normalize;

pub use geokeys::GeoKeys;
pub use mercator::{lat_lng_to_mercator, mercator_to_lat_lng, MAX_LATITUDE, MERCATOR_HALF_EXTENT};
pub use normalize::{normalize, normalize_with_crs, NormalizedBounds, FALLBACK_BOUNDS};
