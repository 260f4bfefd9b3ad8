//! Decoded raster grids.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, NoDataRule, RasterError, RasterResult};

/// The coordinate space the grid's rows and columns are linear in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexSpace {
    /// Rows/columns are evenly spaced in degrees over the WGS84 bounds.
    Geographic,
    /// Rows/columns are evenly spaced in Web Mercator meters over `native`.
    WebMercator { native: BoundingBox },
}

/// A single decoded band with its geographic placement.
///
/// Row-major with the origin at the north-west cell. The sample buffer is
/// shared and never mutated after construction, so clones are cheap value
/// copies that stay valid after the owning layer is removed.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    /// Samples, `width * height` long.
    pub data: Arc<[f32]>,
    /// WGS84 `[west, south, east, north]`.
    pub bounds: BoundingBox,
    pub index_space: IndexSpace,
    pub nodata: NoDataRule,
}

impl RasterGrid {
    /// Build a grid, checking that the sample count matches the dimensions.
    pub fn new(
        width: usize,
        height: usize,
        data: Vec<f32>,
        bounds: BoundingBox,
        index_space: IndexSpace,
    ) -> RasterResult<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::format(format!(
                "raster has empty dimensions {}x{}",
                width, height
            )));
        }
        if data.len() != width * height {
            return Err(RasterError::format(format!(
                "expected {} samples for {}x{}, got {}",
                width * height,
                width,
                height,
                data.len()
            )));
        }

        let nodata = NoDataRule::from_samples(&data);
        Ok(Self {
            width,
            height,
            data: data.into(),
            bounds,
            index_space,
            nodata,
        })
    }

    /// Sample at a cell, or `None` if the cell is out of range.
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Sample at a cell if it is in range and not no-data.
    #[inline]
    pub fn valid_at(&self, col: usize, row: usize) -> Option<f32> {
        self.get(col, row).filter(|v| self.nodata.is_valid(*v))
    }

    /// Count of cells that are not no-data.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| self.nodata.is_valid(**v)).count()
    }
}
