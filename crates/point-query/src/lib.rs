//! Point queries against decoded rasters and the confidence-interval maths
//! built on them.
//!
//! Queries are synchronous reads over already-decoded grids: they never
//! fetch, never allocate on the fast path, and report "outside the raster"
//! and "no data here" as `None` rather than as errors.

pub mod ci;
pub mod sample;

pub use ci::{compute_ci, ConfidenceInterval, SeNaming, Z_95};
pub use sample::{resolve_cell, sample, sample_fast, CellPosition, EDGE_TOLERANCE};
