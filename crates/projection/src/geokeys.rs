//! GeoTIFF GeoKeyDirectory parsing.
//!
//! The directory (tag 34735) is a flat `u16` array: a 4-entry header
//! `[version, revision, minor, key_count]` followed by `key_count` entries of
//! `[key_id, tiff_tag_location, count, value_offset]`. Only keys stored
//! inline (`tiff_tag_location == 0`) are read; that covers every key used to
//! identify the coordinate system.

use raster_common::CrsCode;
use serde::Serialize;

/// GTModelTypeGeoKey
pub const GT_MODEL_TYPE: u16 = 1024;
/// GTRasterTypeGeoKey
pub const GT_RASTER_TYPE: u16 = 1025;
/// GeographicTypeGeoKey
pub const GEOGRAPHIC_TYPE: u16 = 2048;
/// ProjectedCSTypeGeoKey
pub const PROJECTED_CS_TYPE: u16 = 3072;

/// Model type values.
pub const MODEL_TYPE_PROJECTED: u16 = 1;
pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

/// "User-defined" code; carries no EPSG identity.
pub const USER_DEFINED: u16 = 32767;

/// The geo-keys relevant to locating a raster on the globe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoKeys {
    pub model_type: Option<u16>,
    pub raster_type: Option<u16>,
    pub geographic_type: Option<u16>,
    pub projected_cs_type: Option<u16>,
    /// Number of keys in the directory, including ones not interpreted.
    pub key_count: usize,
}

impl GeoKeys {
    /// Parse a GeoKeyDirectory. Truncated or malformed directories yield
    /// whatever keys could be read; a missing CRS is handled downstream.
    pub fn from_directory(directory: &[u16]) -> Self {
        let mut keys = GeoKeys::default();
        if directory.len() < 4 {
            return keys;
        }

        let declared = directory[3] as usize;
        for entry in directory[4..].chunks_exact(4).take(declared) {
            let (key_id, location, value) = (entry[0], entry[1], entry[3]);
            keys.key_count += 1;
            if location != 0 {
                continue;
            }
            match key_id {
                GT_MODEL_TYPE => keys.model_type = Some(value),
                GT_RASTER_TYPE => keys.raster_type = Some(value),
                GEOGRAPHIC_TYPE => keys.geographic_type = Some(value),
                PROJECTED_CS_TYPE => keys.projected_cs_type = Some(value),
                _ => {}
            }
        }
        keys
    }

    /// Coordinate system identified by the keys.
    ///
    /// A projected code takes precedence over a geographic one; user-defined
    /// codes are reported as `Other(32767)`.
    pub fn crs(&self) -> CrsCode {
        let projected = self
            .projected_cs_type
            .filter(|_| self.model_type != Some(MODEL_TYPE_GEOGRAPHIC));
        match (projected, self.geographic_type) {
            (Some(code), _) => CrsCode::from_epsg(code as u32),
            (None, Some(code)) => CrsCode::from_epsg(code as u32),
            (None, None) => CrsCode::Unspecified,
        }
    }
}
