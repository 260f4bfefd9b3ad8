//! Native bounds from GeoTIFF model tags.
//!
//! ModelTiepoint + ModelPixelScale is the common form; ModelTransformation
//! is accepted when those are absent, with any rotation terms ignored.
//! PixelIsPoint rasters are widened by half a cell so the bounds always
//! describe cell edges.

use raster_common::BoundingBox;
use tracing::warn;

use crate::decode::DecodedTiff;
use crate::error::{LoaderError, Result};

/// GTRasterTypeGeoKey value for PixelIsPoint.
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Native-CRS bounds of the raster, `[west, south, east, north]`, plus any
/// caveats raised while deriving them.
pub fn native_bounds(tiff: &DecodedTiff) -> Result<(BoundingBox, Vec<String>)> {
    let width = tiff.width as f64;
    let height = tiff.height as f64;
    let mut warnings = Vec::new();

    let (origin_x, origin_y, scale_x, scale_y) = match (&tiff.tiepoint, &tiff.pixel_scale) {
        (Some(tie), Some(scale)) if tie.len() >= 6 && scale.len() >= 2 => {
            // Tiepoint: [i, j, k, x, y, z] ties pixel (i, j) to model (x, y).
            let (sx, sy) = (scale[0], scale[1]);
            (tie[3] - tie[0] * sx, tie[4] + tie[1] * sy, sx, sy)
        }
        _ => match &tiff.transformation {
            Some(m) if m.len() >= 16 => {
                if m[1] != 0.0 || m[4] != 0.0 {
                    let msg = "ModelTransformation has rotation terms, ignoring them".to_string();
                    warn!("{}", msg);
                    warnings.push(msg);
                }
                // x = m[0]*i + m[3]; y = m[5]*j + m[7], m[5] negative for north-up.
                (m[3], m[7], m[0], -m[5])
            }
            _ => {
                return Err(LoaderError::missing_georeference(
                    "no ModelTiepoint/ModelPixelScale or ModelTransformation tags",
                ))
            }
        },
    };

    let (origin_x, origin_y) = if tiff.geo_keys.raster_type == Some(RASTER_PIXEL_IS_POINT) {
        (origin_x - scale_x / 2.0, origin_y + scale_y / 2.0)
    } else {
        (origin_x, origin_y)
    };

    let west = origin_x;
    let north = origin_y;
    let east = origin_x + width * scale_x;
    let south = origin_y - height * scale_y;

    Ok((BoundingBox::new(west, south, east, north), warnings))
}
