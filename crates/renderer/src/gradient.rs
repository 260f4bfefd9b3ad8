//! Gradient rendering of prevalence grids.

use rayon::prelude::*;
use raster_common::{NoDataRule, RasterGrid};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::colormap::{Color, Colormap};
use crate::error::RenderError;
use crate::png;

/// Rescale range used when a band has no valid samples; matches the
/// percentage-like scale of the prevalence surfaces.
pub const DEFAULT_RESCALE: Rescale = Rescale { min: 0.0, max: 11.0 };

/// The `[min, max]` value interval mapped onto a ramp's `[0, 1]` domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rescale {
    pub min: f32,
    pub max: f32,
}

impl Rescale {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Scan the valid samples once for their min/max.
    ///
    /// Falls back to [`DEFAULT_RESCALE`] when every sample is no-data.
    pub fn detect(data: &[f32], nodata: &NoDataRule) -> Self {
        let (min, max) = data
            .iter()
            .copied()
            .filter(|v| nodata.is_valid(*v))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        if min.is_finite() && max.is_finite() {
            Self { min, max }
        } else {
            DEFAULT_RESCALE
        }
    }

    /// Map a value into `[0, 1]`.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let range = self.max - self.min;
        let range = if range.abs() < 0.001 { 1.0 } else { range };
        ((value - self.min) / range).clamp(0.0, 1.0)
    }
}

/// Colour for one sample: transparent for no-data, otherwise the ramp colour
/// at the sample's rescaled position.
#[inline]
pub fn value_to_color(
    value: f32,
    rescale: &Rescale,
    colormap: &Colormap,
    nodata: &NoDataRule,
) -> Color {
    if nodata.is_nodata(value) {
        return Color::transparent();
    }
    colormap.color_at(rescale.normalize(value))
}

/// An RGBA image, row-major with the origin at the top-left pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    /// 4 bytes per pixel.
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 0)
    }

    /// Encode as PNG, indexed when the palette fits.
    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        png::create_png_auto(&self.pixels, self.width, self.height)
    }
}

/// Render a band into an RGBA image. Rows are coloured in parallel.
pub fn render(
    data: &[f32],
    width: usize,
    height: usize,
    rescale: &Rescale,
    colormap: &Colormap,
    nodata: &NoDataRule,
) -> Result<RgbaImage, RenderError> {
    if data.len() != width * height {
        return Err(RenderError::BufferSize {
            width,
            height,
            expected: width * height,
            actual: data.len(),
        });
    }

    let mut pixels = vec![0u8; width * height * 4];
    if width > 0 {
        pixels
            .par_chunks_mut(width * 4)
            .zip(data.par_chunks(width))
            .for_each(|(out_row, in_row)| {
                for (px, &value) in out_row.chunks_exact_mut(4).zip(in_row) {
                    px.copy_from_slice(&value_to_color(value, rescale, colormap, nodata).to_array());
                }
            });
    }

    Ok(RgbaImage {
        width,
        height,
        pixels,
    })
}

/// Options forwarded from a load request to the materializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Ramp name; unknown names fall back to viridis.
    pub colormap: String,
    /// Explicit range, or `None` to detect it from the data.
    pub rescale: Option<Rescale>,
    /// Log per-render statistics.
    #[serde(default)]
    pub debug: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            colormap: "viridis".to_string(),
            rescale: None,
            debug: false,
        }
    }
}

/// Counts gathered while materializing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderStats {
    pub valid_cells: usize,
    pub nodata_cells: usize,
}

/// A rendered image plus the parameters it was rendered with.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub image: RgbaImage,
    pub rescale: Rescale,
    pub colormap: &'static str,
    pub stats: RenderStats,
}

/// Render a grid with the requested options.
pub fn materialize(grid: &RasterGrid, options: &RenderOptions) -> Result<Materialized, RenderError> {
    let colormap = Colormap::resolve(&options.colormap);
    let rescale = options
        .rescale
        .unwrap_or_else(|| Rescale::detect(&grid.data, &grid.nodata));

    let image = render(
        &grid.data,
        grid.width,
        grid.height,
        &rescale,
        colormap,
        &grid.nodata,
    )?;

    let valid_cells = grid.valid_count();
    let stats = RenderStats {
        valid_cells,
        nodata_cells: grid.data.len() - valid_cells,
    };

    if options.debug {
        info!(
            width = grid.width,
            height = grid.height,
            valid = stats.valid_cells,
            nodata = stats.nodata_cells,
            threshold = grid.nodata.threshold,
            min = rescale.min,
            max = rescale.max,
            colormap = colormap.name,
            "materialized raster"
        );
    }

    Ok(Materialized {
        image,
        rescale,
        colormap: colormap.name,
        stats,
    })
}
