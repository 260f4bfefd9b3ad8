//! Shared test utilities for the prevalence raster workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic prevalence grid generators
//! - An in-memory GeoTIFF builder
//! - A localhost HTTP server that serves fixtures with `Range` support
//! - Common bounding boxes
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{GeoTiffBuilder, FixtureServer};
//! ```

pub mod fixtures;
pub mod generators;
pub mod geotiff;
pub mod server;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use geotiff::GeoTiffBuilder;
pub use server::FixtureServer;
