//! Normalization of native raster bounds into WGS84 degrees.
//!
//! Geo-referencing gaps never abort a load. Each heuristic that fires
//! records a warning on the result instead.

use raster_common::{BoundingBox, CrsCode, IndexSpace};
use serde::Serialize;
use tracing::warn;

use crate::geokeys::GeoKeys;
use crate::mercator::mercator_to_lat_lng;

/// Box used when the real bounds are unusable: continental Africa,
/// `[west, south, east, north]`.
pub const FALLBACK_BOUNDS: [f64; 4] = [-20.0, -35.0, 55.0, 38.0];

/// Degrees trimmed from each side of an exactly global box.
pub const GLOBAL_SHRINK_DEG: f64 = 0.1;

const GLOBAL_BOUNDS: [f64; 4] = [-180.0, -90.0, 180.0, 90.0];

/// Result of normalizing a raster's native bounds.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedBounds {
    /// WGS84 bounds. Always finite, ordered and within ±180/±90.
    pub bounds: BoundingBox,
    /// CRS the native bounds were interpreted in.
    pub crs: CrsCode,
    /// How pixel rows/columns map onto coordinates.
    pub index_space: IndexSpace,
    /// Set when `bounds` is the fallback extent or a shrunk global box,
    /// i.e. the raster's own geo-referencing did not place it.
    pub estimated: bool,
    /// Heuristics and caveats applied along the way.
    pub warnings: Vec<String>,
}

/// Normalize native bounds using the CRS identified by the geo-keys.
pub fn normalize(native: &BoundingBox, geo_keys: &GeoKeys) -> NormalizedBounds {
    normalize_with_crs(native, geo_keys.crs())
}

/// Normalize native bounds expressed in `crs`.
///
/// Web Mercator is inverse-projected, WGS84 passes through, anything else
/// is assumed geographic with a warning. Then, in order:
///
/// 1. an exactly global box is shrunk by [`GLOBAL_SHRINK_DEG`] per side,
/// 2. a box with any non-finite edge is replaced by [`FALLBACK_BOUNDS`],
/// 3. longitudes are clamped to ±180 and latitudes to ±90.
///
/// Reversed edges are then re-ordered, and a box that is still empty is
/// replaced by the fallback as well.
pub fn normalize_with_crs(native: &BoundingBox, crs: CrsCode) -> NormalizedBounds {
    let mut warnings = Vec::new();

    let mut bounds = match crs {
        CrsCode::Epsg3857 => {
            let (south, west) = mercator_to_lat_lng(native.min_x, native.min_y);
            let (north, east) = mercator_to_lat_lng(native.max_x, native.max_y);
            BoundingBox::new(west, south, east, north)
        }
        CrsCode::Epsg4326 => *native,
        CrsCode::Other(_) | CrsCode::Unspecified => {
            let msg = format!("unrecognized CRS ({}), assuming geographic coordinates", crs);
            warn!(crs = %crs, "{}", msg);
            warnings.push(msg);
            *native
        }
    };
    let mut used_fallback = false;
    let global = bounds.to_array() == GLOBAL_BOUNDS;

    if global {
        bounds = BoundingBox::new(
            -180.0 + GLOBAL_SHRINK_DEG,
            -90.0 + GLOBAL_SHRINK_DEG,
            180.0 - GLOBAL_SHRINK_DEG,
            90.0 - GLOBAL_SHRINK_DEG,
        );
        warnings.push("bounds cover the whole globe, treating as unavailable and shrinking".into());
    }

    if !bounds.is_finite() {
        let msg = format!("non-finite bounds {:?}, using fallback extent", bounds.to_array());
        warn!("{}", msg);
        warnings.push(msg);
        bounds = BoundingBox::from_array(FALLBACK_BOUNDS);
        used_fallback = true;
    }

    bounds = clamp_geographic(&bounds).ordered();

    if !bounds.is_valid() {
        let msg = format!("degenerate bounds {:?}, using fallback extent", bounds.to_array());
        warn!("{}", msg);
        warnings.push(msg);
        bounds = BoundingBox::from_array(FALLBACK_BOUNDS);
        used_fallback = true;
    }

    let index_space = match crs {
        CrsCode::Epsg3857 if !used_fallback && native.ordered().is_valid() => {
            IndexSpace::WebMercator {
                native: native.ordered(),
            }
        }
        _ => IndexSpace::Geographic,
    };

    NormalizedBounds {
        bounds,
        crs,
        index_space,
        estimated: used_fallback || global,
        warnings,
    }
}

fn clamp_geographic(b: &BoundingBox) -> BoundingBox {
    BoundingBox::new(
        b.min_x.clamp(-180.0, 180.0),
        b.min_y.clamp(-90.0, 90.0),
        b.max_x.clamp(-180.0, 180.0),
        b.max_y.clamp(-90.0, 90.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_passes_through() {
        let native = BoundingBox::new(-17.5, -34.8, 51.4, 37.3);
        let result = normalize_with_crs(&native, CrsCode::Epsg4326);
        assert_eq!(result.bounds, native);
        assert!(result.warnings.is_empty());
        assert_eq!(result.index_space, IndexSpace::Geographic);
        assert!(!result.estimated);
    }

    #[test]
    fn test_unknown_crs_warns_and_passes_through() {
        let native = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        let result = normalize_with_crs(&native, CrsCode::Other(32633));
        assert_eq!(result.bounds, native);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("EPSG:32633"));
    }

    #[test]
    fn test_web_mercator_converts_and_keeps_native_index() {
        let native = BoundingBox::new(-2_226_389.8, -4_163_881.1, 6_122_571.9, 4_579_425.8);
        let result = normalize_with_crs(&native, CrsCode::Epsg3857);
        let [w, s, e, n] = result.bounds.to_array();
        assert!((w + 20.0).abs() < 1e-3, "west {}", w);
        assert!((e - 55.0).abs() < 1e-3, "east {}", e);
        assert!((s + 35.0).abs() < 1e-3, "south {}", s);
        assert!((n - 38.0).abs() < 1e-3, "north {}", n);
        assert_eq!(result.index_space, IndexSpace::WebMercator { native });
    }

    #[test]
    fn test_degenerate_box_uses_fallback() {
        let native = BoundingBox::new(10.0, 5.0, 10.0, 5.0);
        let result = normalize_with_crs(&native, CrsCode::Epsg4326);
        assert_eq!(result.bounds.to_array(), FALLBACK_BOUNDS);
        assert!(result.estimated);
    }

    #[test]
    fn test_global_box_is_estimated() {
        let native = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
        let result = normalize_with_crs(&native, CrsCode::Epsg4326);
        assert!(result.estimated);
    }

    #[test]
    fn test_reversed_box_is_reordered() {
        let native = BoundingBox::new(20.0, 10.0, 10.0, -10.0);
        let result = normalize_with_crs(&native, CrsCode::Epsg4326);
        assert_eq!(result.bounds.to_array(), [10.0, -10.0, 20.0, 10.0]);
    }
}
