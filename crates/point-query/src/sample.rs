//! Fast and precise pixel sampling.
//!
//! Both variants share [`resolve_cell`]. The fast one returns the resolved
//! cell's value and nothing else; the precise one additionally looks at
//! neighbouring cells when the resolved cell is no-data and the point sits
//! within [`EDGE_TOLERANCE`] of a neighbour, so clicks on the edge of the
//! covered area do not come back empty.

use projection::{lat_lng_to_mercator, MAX_LATITUDE};
use raster_common::{IndexSpace, RasterGrid};

/// How close (in cell widths) a point must be to a neighbouring cell for
/// the precise sampler to consider it.
pub const EDGE_TOLERANCE: f64 = 0.25;

/// A point located on a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPosition {
    pub col: usize,
    pub row: usize,
    /// Continuous column coordinate, `0.0..=width`.
    pub fx: f64,
    /// Continuous row coordinate from the north edge, `0.0..=height`.
    pub fy: f64,
}

/// Locate the cell containing `(lng, lat)`.
///
/// `None` for non-finite input, for `|lat| > MAX_LATITUDE`, and for points
/// outside the grid. Points exactly on the south or east edge map to the
/// last row or column.
#[inline]
pub fn resolve_cell(grid: &RasterGrid, lng: f64, lat: f64) -> Option<CellPosition> {
    if !lng.is_finite() || !lat.is_finite() || lat.abs() > MAX_LATITUDE {
        return None;
    }

    let (x, y, extent) = match grid.index_space {
        IndexSpace::Geographic => (lng, lat, grid.bounds),
        IndexSpace::WebMercator { native } => {
            let (x, y) = lat_lng_to_mercator(lat, lng);
            (x, y, native)
        }
    };

    if !extent.contains_point(x, y) {
        return None;
    }

    let fx = (x - extent.min_x) / extent.width() * grid.width as f64;
    let fy = (extent.max_y - y) / extent.height() * grid.height as f64;
    if !fx.is_finite() || !fy.is_finite() {
        return None;
    }

    let col = (fx.floor() as usize).min(grid.width - 1);
    let row = (fy.floor() as usize).min(grid.height - 1);
    Some(CellPosition { col, row, fx, fy })
}

/// Value under the point, for continuous hover feedback.
///
/// `None` outside the grid or on a no-data cell.
#[inline]
pub fn sample_fast(grid: &RasterGrid, lng: f64, lat: f64) -> Option<f32> {
    let cell = resolve_cell(grid, lng, lat)?;
    grid.valid_at(cell.col, cell.row)
}

/// Value under the point, for discrete click queries.
///
/// Like [`sample_fast`], but when the resolved cell is no-data the nearest
/// valid neighbour within [`EDGE_TOLERANCE`] of the point is used instead.
pub fn sample(grid: &RasterGrid, lng: f64, lat: f64) -> Option<f32> {
    let cell = resolve_cell(grid, lng, lat)?;
    if let Some(v) = grid.valid_at(cell.col, cell.row) {
        return Some(v);
    }

    let mut best: Option<(f64, f32)> = None;
    for dr in -1i64..=1 {
        for dc in -1i64..=1 {
            if dr == 0 && dc == 0 {
                continue;
            }
            let c = cell.col as i64 + dc;
            let r = cell.row as i64 + dr;
            if c < 0 || r < 0 {
                continue;
            }
            let (c, r) = (c as usize, r as usize);
            let Some(value) = grid.valid_at(c, r) else {
                continue;
            };

            let dist = distance_to_cell(cell.fx, cell.fy, c, r);
            if dist <= EDGE_TOLERANCE && best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, value));
            }
        }
    }
    best.map(|(_, v)| v)
}

/// Distance in cell units from a continuous grid position to a cell's
/// nearest edge (0 when inside).
fn distance_to_cell(fx: f64, fy: f64, col: usize, row: usize) -> f64 {
    let (c, r) = (col as f64, row as f64);
    let dx = (c - fx).max(fx - (c + 1.0)).max(0.0);
    let dy = (r - fy).max(fy - (r + 1.0)).max(0.0);
    dx.hypot(dy)
}
