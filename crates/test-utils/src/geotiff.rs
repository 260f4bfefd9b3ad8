//! In-memory GeoTIFF fixtures.
//!
//! Builds real TIFF/BigTIFF bytes with the `tiff` encoder and the GeoTIFF
//! tags the loader reads, so decoding is exercised end to end without any
//! files on disk.

use std::io::{Cursor, Seek, Write};

use tiff::encoder::colortype::{Gray32Float, RGB32Float};
use tiff::encoder::{TiffEncoder, TiffKind};
use tiff::tags::Tag;

/// How the fixture is geo-referenced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Georef {
    /// ModelTiepoint + ModelPixelScale for the given bounds.
    Tiepoint,
    /// A 4x4 ModelTransformation matrix for the given bounds.
    Transformation,
    /// No geo-referencing tags at all.
    None,
}

/// Builder for a single-image GeoTIFF.
#[derive(Debug, Clone)]
pub struct GeoTiffBuilder {
    width: u32,
    height: u32,
    bands: usize,
    data: Vec<f32>,
    bounds: [f64; 4],
    epsg: Option<u16>,
    nodata: Option<String>,
    georef: Georef,
    big: bool,
}

impl GeoTiffBuilder {
    /// A single-band float32 raster covering `bounds` (`[west, south, east, north]`
    /// in the CRS set by [`epsg`](Self::epsg), WGS84 by default).
    pub fn new(width: u32, height: u32, data: Vec<f32>, bounds: [f64; 4]) -> Self {
        Self {
            width,
            height,
            bands: 1,
            data,
            bounds,
            epsg: Some(4326),
            nodata: None,
            georef: Georef::Tiepoint,
            big: false,
        }
    }

    /// Interpret `data` as pixel-interleaved RGB float32 (three bands).
    pub fn three_bands(mut self) -> Self {
        self.bands = 3;
        self
    }

    /// CRS code written to the GeoKeyDirectory; `None` omits the directory.
    pub fn epsg(mut self, code: Option<u16>) -> Self {
        self.epsg = code;
        self
    }

    /// GDAL_NODATA value, written as ASCII.
    pub fn nodata(mut self, value: &str) -> Self {
        self.nodata = Some(value.to_string());
        self
    }

    pub fn georef(mut self, georef: Georef) -> Self {
        self.georef = georef;
        self
    }

    /// Write a BigTIFF instead of a classic TIFF.
    pub fn bigtiff(mut self) -> Self {
        self.big = true;
        self
    }

    /// Encode to bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        if self.big {
            let mut encoder = TiffEncoder::new_big(&mut buf).expect("bigtiff encoder");
            self.write(&mut encoder).expect("write bigtiff");
        } else {
            let mut encoder = TiffEncoder::new(&mut buf).expect("tiff encoder");
            self.write(&mut encoder).expect("write tiff");
        }
        buf.into_inner()
    }

    fn write<W: Write + Seek, K: TiffKind>(
        &self,
        encoder: &mut TiffEncoder<W, K>,
    ) -> tiff::TiffResult<()> {
        if self.bands == 3 {
            let mut image = encoder.new_image::<RGB32Float>(self.width, self.height)?;
            self.write_geo_tags(image.encoder())?;
            image.write_data(&self.data)
        } else {
            let mut image = encoder.new_image::<Gray32Float>(self.width, self.height)?;
            self.write_geo_tags(image.encoder())?;
            image.write_data(&self.data)
        }
    }

    fn write_geo_tags<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut tiff::encoder::DirectoryEncoder<W, K>,
    ) -> tiff::TiffResult<()> {
        let [west, south, east, north] = self.bounds;
        let scale_x = (east - west) / self.width as f64;
        let scale_y = (north - south) / self.height as f64;

        match self.georef {
            Georef::Tiepoint => {
                let scale = [scale_x, scale_y, 0.0];
                dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
                let tiepoint = [0.0, 0.0, 0.0, west, north, 0.0];
                dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
            }
            Georef::Transformation => {
                let matrix = [
                    scale_x, 0.0, 0.0, west, //
                    0.0, -scale_y, 0.0, north, //
                    0.0, 0.0, 0.0, 0.0, //
                    0.0, 0.0, 0.0, 1.0,
                ];
                dir.write_tag(Tag::ModelTransformationTag, &matrix[..])?;
            }
            Georef::None => {}
        }

        if let Some(code) = self.epsg {
            let geographic = code == 4326 || (4000..5000).contains(&code);
            let (model_type, crs_key) = if geographic { (2, 2048) } else { (1, 3072) };
            let keys: [u16; 16] = [
                1, 1, 0, 3, // header: version, revision, minor, key count
                1024, 0, 1, model_type, // GTModelType
                1025, 0, 1, 1, // GTRasterType = PixelIsArea
                crs_key, 0, 1, code,
            ];
            dir.write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
        }

        if let Some(nodata) = &self.nodata {
            dir.write_tag(Tag::GdalNodata, nodata.as_str())?;
        }
        Ok(())
    }
}
