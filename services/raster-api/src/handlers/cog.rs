//! Raster metadata for arbitrary URLs.
//!
//! Nothing here touches the registry. `/cog/bounds` answers in the shape
//! the loader's bounds-service client expects, so one instance can serve
//! bounds for another.

use axum::{
    extract::{Extension, Query},
    Json,
};
use projection::normalize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CogQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub url: String,
    pub width: usize,
    pub height: usize,
    pub bands: u32,
    pub sample_format: &'static str,
    pub compression: String,
    pub bigtiff: bool,
    pub tiled: bool,
    pub crs: String,
    /// Bounds in the raster's own CRS.
    pub native_bounds: [f64; 4],
    /// WGS84 bounds.
    pub bounds: [f64; 4],
    pub nodata: Option<f64>,
    pub range_reads: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BoundsResponse {
    pub bounds: [f64; 4],
}

/// GET /cog/info?url= - Raster metadata
#[instrument(skip(state))]
pub async fn info_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<CogQuery>,
) -> Result<Json<InfoResponse>, ApiError> {
    let image = state
        .pipeline
        .loader()
        .load(&query.url)
        .await
        .map_err(|e| ApiError::raster(&e, &query.url))?;

    let normalized = normalize(&image.native_bounds, &image.geo_keys);
    let mut warnings = image.warnings.clone();
    warnings.extend(normalized.warnings);

    info!(url = %query.url, width = image.width, height = image.height, "Info request");

    Ok(Json(InfoResponse {
        crs: image.crs().to_string(),
        url: image.url,
        width: image.width,
        height: image.height,
        bands: image.info.bands,
        sample_format: image.info.sample_format,
        compression: image.info.compression,
        bigtiff: image.info.bigtiff,
        tiled: image.info.tiled,
        native_bounds: image.native_bounds.to_array(),
        bounds: normalized.bounds.to_array(),
        nodata: image.nodata,
        range_reads: image.range_reads,
        warnings,
    }))
}

/// GET /cog/bounds?url= - WGS84 bounds
#[instrument(skip(state))]
pub async fn bounds_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<CogQuery>,
) -> Result<Json<BoundsResponse>, ApiError> {
    let image = state
        .pipeline
        .loader()
        .load(&query.url)
        .await
        .map_err(|e| ApiError::raster(&e, &query.url))?;

    let normalized = normalize(&image.native_bounds, &image.geo_keys);
    Ok(Json(BoundsResponse {
        bounds: normalized.bounds.to_array(),
    }))
}
