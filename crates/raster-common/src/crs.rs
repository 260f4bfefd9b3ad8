//! Coordinate Reference System identifiers read from GeoTIFF geo-keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRS of a raster's native grid.
///
/// Only WGS84 geographic and Web Mercator are understood; everything else
/// is carried through as `Other` so it can be reported, and the pipeline
/// treats it as geographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// A code we do not project from
    Other(u16),
    /// No CRS geo-key present
    Unspecified,
}

impl CrsCode {
    /// Map an EPSG code to a CRS.
    ///
    /// 3857, 3785 (deprecated alias) and 900913 are all spherical Web Mercator.
    pub fn from_epsg(code: u32) -> Self {
        match code {
            4326 => CrsCode::Epsg4326,
            3857 | 3785 | 900913 => CrsCode::Epsg3857,
            other => CrsCode::Other(other.min(u16::MAX as u32) as u16),
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }

    /// Whether the normalizer knows how to handle this CRS without guessing.
    pub fn is_recognized(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg3857)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsCode::Epsg4326 => write!(f, "EPSG:4326"),
            CrsCode::Epsg3857 => write!(f, "EPSG:3857"),
            CrsCode::Other(code) => write!(f, "EPSG:{}", code),
            CrsCode::Unspecified => write!(f, "unspecified"),
        }
    }
}
