//! Materialization of prevalence grids into colour-mapped imagery.
//!
//! - Named 10-stop colour ramps
//! - Pure value-to-RGBA mapping with explicit rescale bounds
//! - Row-parallel rendering of whole grids
//! - PNG encoding (indexed or RGBA)

pub mod colormap;
pub mod error;
pub mod gradient;
pub mod png;

pub use colormap::{Color, Colormap, VIRIDIS};
pub use error::RenderError;
pub use gradient::{
    materialize, render, value_to_color, Materialized, RenderOptions, RenderStats, Rescale,
    RgbaImage, DEFAULT_RESCALE,
};
