//! TIFF/BigTIFF decoding of the first band.

use std::io::Cursor;

use projection::GeoKeys;
use serde::Serialize;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, warn};

use crate::error::{LoaderError, Result};
use crate::fetch::check_magic;

/// Buffer limit for decoding (1 GB, a 16000x16000 float band).
const DECODE_LIMIT: usize = 1024 * 1024 * 1024;

/// Image-file-directory facts reported alongside the samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiffInfo {
    pub bigtiff: bool,
    pub little_endian: bool,
    pub tiled: bool,
    pub compression: String,
    pub sample_format: &'static str,
    pub bands: u32,
    pub planar_configuration: u32,
}

/// A decoded raster: band 0 plus the tags needed to georeference it.
#[derive(Debug, Clone)]
pub struct DecodedTiff {
    pub info: TiffInfo,
    pub width: u32,
    pub height: u32,
    /// Band 0, row-major from the top-left; declared no-data cells are NaN.
    pub samples: Vec<f32>,
    pub geo_keys: GeoKeys,
    pub tiepoint: Option<Vec<f64>>,
    pub pixel_scale: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    /// GDAL_NODATA value, if declared.
    pub nodata: Option<f64>,
    pub warnings: Vec<String>,
}

/// Decode the first image of a TIFF held in memory.
pub fn decode(bytes: &[u8]) -> Result<DecodedTiff> {
    check_magic(bytes)?;
    let bigtiff = bytes[2] == 43 || bytes[3] == 43;
    let little_endian = bytes[0] == b'I';

    let mut limits = Limits::default();
    limits.decoding_buffer_size = DECODE_LIMIT;
    limits.intermediate_buffer_size = DECODE_LIMIT;
    limits.ifd_value_size = 64 * 1024 * 1024;
    let mut decoder = Decoder::new(Cursor::new(bytes))?.with_limits(limits);

    let (width, height) = decoder.dimensions()?;
    let bands = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1).max(1);
    let planar_configuration = decoder.get_tag_u32(Tag::PlanarConfiguration).unwrap_or(1);
    let compression = compression_name(decoder.get_tag_u32(Tag::Compression).unwrap_or(1));
    let tiled = matches!(decoder.find_tag(Tag::TileWidth), Ok(Some(_)));

    let geo_keys = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .map(|dir| GeoKeys::from_directory(&dir))
        .unwrap_or_default();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();
    let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let transformation = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok();
    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse::<f64>().ok());

    debug!(
        width,
        height,
        bands,
        bigtiff,
        tiled,
        compression = %compression,
        "decoding tiff"
    );

    let (all_samples, sample_format) = to_f32(decoder.read_image()?)?;

    let mut warnings = Vec::new();
    let pixels = width as usize * height as usize;
    let mut samples = if bands == 1 {
        all_samples
    } else {
        let msg = format!("raster has {} bands, using band 0", bands);
        warn!("{}", msg);
        warnings.push(msg);
        if planar_configuration == 2 {
            // Separate planes: band 0 is the first plane.
            all_samples.into_iter().take(pixels).collect()
        } else {
            all_samples
                .into_iter()
                .step_by(bands as usize)
                .take(pixels)
                .collect()
        }
    };

    if samples.len() != pixels {
        return Err(LoaderError::unsupported(format!(
            "decoded {} samples for a {}x{} band",
            samples.len(),
            width,
            height
        )));
    }

    if let Some(nd) = nodata.filter(|v| v.is_finite()) {
        let nd = nd as f32;
        for v in samples.iter_mut().filter(|v| **v == nd) {
            *v = f32::NAN;
        }
    }

    Ok(DecodedTiff {
        info: TiffInfo {
            bigtiff,
            little_endian,
            tiled,
            compression,
            sample_format,
            bands,
            planar_configuration,
        },
        width,
        height,
        samples,
        geo_keys,
        tiepoint,
        pixel_scale,
        transformation,
        nodata,
        warnings,
    })
}

fn to_f32(result: DecodingResult) -> Result<(Vec<f32>, &'static str)> {
    #[allow(unreachable_patterns)]
    let converted = match result {
        DecodingResult::F32(data) => (data, "float32"),
        DecodingResult::F64(data) => (data.into_iter().map(|v| v as f32).collect(), "float64"),
        DecodingResult::U8(data) => (data.into_iter().map(|v| v as f32).collect(), "uint8"),
        DecodingResult::U16(data) => (data.into_iter().map(|v| v as f32).collect(), "uint16"),
        DecodingResult::U32(data) => (data.into_iter().map(|v| v as f32).collect(), "uint32"),
        DecodingResult::U64(data) => (data.into_iter().map(|v| v as f32).collect(), "uint64"),
        DecodingResult::I8(data) => (data.into_iter().map(|v| v as f32).collect(), "int8"),
        DecodingResult::I16(data) => (data.into_iter().map(|v| v as f32).collect(), "int16"),
        DecodingResult::I32(data) => (data.into_iter().map(|v| v as f32).collect(), "int32"),
        DecodingResult::I64(data) => (data.into_iter().map(|v| v as f32).collect(), "int64"),
        _ => return Err(LoaderError::unsupported("sample format")),
    };
    Ok(converted)
}

fn compression_name(code: u32) -> String {
    match code {
        1 => "none".to_string(),
        5 => "lzw".to_string(),
        6 | 7 => "jpeg".to_string(),
        8 | 32946 => "deflate".to_string(),
        32773 => "packbits".to_string(),
        34887 => "lerc".to_string(),
        50000 => "zstd".to_string(),
        50001 => "webp".to_string(),
        other => format!("unknown ({})", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_tiff() {
        assert!(matches!(decode(b"GIF89a.."), Err(LoaderError::NotTiff(_))));
    }

    #[test]
    fn test_truncated_tiff_is_error() {
        assert!(decode(b"II*\0\x08\0\0\0").is_err());
    }

    #[test]
    fn test_compression_names() {
        assert_eq!(compression_name(8), "deflate");
        assert_eq!(compression_name(32946), "deflate");
        assert_eq!(compression_name(9), "unknown (9)");
    }
}
