//! Registry endpoints for the map client.
//!
//! Visibility and opacity changes only touch registry metadata. Rescale
//! changes re-render from the decoded grid. Nothing here fetches a raster
//! except registration and the category filter, which start loads.

use axum::{
    extract::{Extension, Json, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use point_query::ConfidenceInterval;
use raster_common::LayerId;
use renderer::{RenderOptions, Rescale};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use storage::{LayerSpec, RasterLayer, RegistryError, VisibleLayer};
use tracing::{info, instrument};

use super::ApiError;
use crate::metrics;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LayerResponse {
    pub id: LayerId,
    pub url: String,
    pub name: String,
    pub category: Option<String>,
    pub state: &'static str,
    pub visible: bool,
    pub opacity: f32,
    pub bounds: Option<[f64; 4]>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub crs: Option<String>,
    pub rescale: Option<Rescale>,
    pub colormap: Option<&'static str>,
    pub image_url: Option<String>,
    pub rendered_at: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl From<&RasterLayer> for LayerResponse {
    fn from(layer: &RasterLayer) -> Self {
        let loaded = layer.loaded();
        Self {
            id: layer.id.clone(),
            url: layer.url.clone(),
            name: layer.name.clone(),
            category: layer.category.clone(),
            state: layer.state.name(),
            visible: layer.visible,
            opacity: layer.opacity,
            bounds: loaded.map(|l| l.bounds().to_array()),
            width: loaded.map(|l| l.grid.width),
            height: loaded.map(|l| l.grid.height),
            crs: loaded.map(|l| l.crs.to_string()),
            rescale: loaded.map(|l| l.rescale),
            colormap: loaded.map(|l| l.colormap),
            image_url: loaded.map(|_| image_url(&layer.id)),
            rendered_at: loaded.map(|l| l.rendered_at),
            warnings: loaded.map(|l| l.warnings.clone()).unwrap_or_default(),
            error: layer.user_error(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VisibleLayerResponse {
    pub id: LayerId,
    pub name: String,
    pub bounds: [f64; 4],
    pub opacity: f32,
    pub image_url: String,
}

impl From<&VisibleLayer> for VisibleLayerResponse {
    fn from(layer: &VisibleLayer) -> Self {
        Self {
            id: layer.id.clone(),
            name: layer.name.clone(),
            bounds: layer.bounds().to_array(),
            opacity: layer.opacity,
            image_url: image_url(&layer.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub value: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub value: Option<f32>,
    pub ci: Option<ConfidenceInterval>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub visible: Vec<LayerId>,
    pub loading: Vec<LayerId>,
}

fn image_url(id: &LayerId) -> String {
    format!("/layers/{}/image.png", id)
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateLayerRequest {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub opacity: Option<f32>,
    /// `[min, max]`
    #[serde(default)]
    pub rescale: Option<[f32; 2]>,
    #[serde(default)]
    pub colormap: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Deserialize)]
pub struct OpacityRequest {
    pub opacity: f32,
}

/// Both bounds, or neither to go back to auto-detection.
#[derive(Debug, Deserialize)]
pub struct RescaleRequest {
    #[serde(default)]
    pub min: Option<f32>,
    #[serde(default)]
    pub max: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub visible_ids: Vec<LayerId>,
}

#[derive(Debug, Deserialize)]
pub struct PointQuery {
    pub lng: f64,
    pub lat: f64,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /layers - All registry entries
pub async fn list_layers_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<LayerResponse>> {
    Json(state.registry.list().iter().map(LayerResponse::from).collect())
}

/// GET /layers/visible - Visible, loaded layers for the map
pub async fn visible_layers_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<VisibleLayerResponse>> {
    Json(
        state
            .registry
            .list_visible()
            .iter()
            .map(VisibleLayerResponse::from)
            .collect(),
    )
}

/// GET /layers/:id - One registry entry
pub async fn get_layer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LayerResponse>, ApiError> {
    let layer = find_layer(&state, &LayerId::new(id))?;
    Ok(Json(LayerResponse::from(&layer)))
}

/// POST /layers - Register a layer by URL and load it
///
/// Registering a URL whose earlier load failed fetches it again.
#[instrument(skip(state, request), fields(url = %request.url))]
pub async fn create_layer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CreateLayerRequest>,
) -> Result<Json<LayerResponse>, ApiError> {
    if request.url.trim().is_empty() {
        return Err(ApiError::bad_request("url must not be empty"));
    }

    let defaults = LayerSpec::new(request.url.clone());
    let spec = LayerSpec {
        name: request.name,
        category: request.category,
        visible: request.visible.unwrap_or(defaults.visible),
        opacity: request.opacity.unwrap_or(defaults.opacity),
        render: RenderOptions {
            colormap: request
                .colormap
                .unwrap_or_else(|| state.config.default_colormap.clone()),
            rescale: request.rescale.map(|[min, max]| Rescale::new(min, max)),
            debug: false,
        },
        ..defaults
    };

    let id = state.registry.declare(spec);
    info!(layer = %id, "Layer registration request");

    if let Err(e) = state.retry_layer(&id).await {
        return Err(load_error(&state, &id, e));
    }

    let layer = find_layer(&state, &id)?;
    Ok(Json(LayerResponse::from(&layer)))
}

/// POST /layers/:id/retry - Fetch a failed layer again
#[instrument(skip(state))]
pub async fn retry_layer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LayerResponse>, ApiError> {
    let id = LayerId::new(id);
    if let Err(e) = state.retry_layer(&id).await {
        return Err(load_error(&state, &id, e));
    }
    Ok(Json(LayerResponse::from(&find_layer(&state, &id)?)))
}

/// DELETE /layers/:id - Remove a layer
pub async fn delete_layer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = LayerId::new(id);
    match state.registry.remove(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(RegistryError::NotFound(id).into()),
    }
}

/// PUT /layers/:id/visibility
pub async fn visibility_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<LayerResponse>, ApiError> {
    let id = LayerId::new(id);
    state.registry.set_visibility(&id, request.visible)?;
    Ok(Json(LayerResponse::from(&find_layer(&state, &id)?)))
}

/// PUT /layers/:id/opacity
pub async fn opacity_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<OpacityRequest>,
) -> Result<Json<LayerResponse>, ApiError> {
    let id = LayerId::new(id);
    state.registry.set_opacity(&id, request.opacity)?;
    Ok(Json(LayerResponse::from(&find_layer(&state, &id)?)))
}

/// PUT /layers/:id/rescale - Re-render with a new value range
#[instrument(skip(state, request))]
pub async fn rescale_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RescaleRequest>,
) -> Result<Json<LayerResponse>, ApiError> {
    let rescale = match (request.min, request.max) {
        (Some(min), Some(max)) if min.is_finite() && max.is_finite() => Some(Rescale::new(min, max)),
        (None, None) => None,
        _ => return Err(ApiError::bad_request("rescale needs finite min and max, or neither")),
    };

    let layer = state.registry.set_rescale(&LayerId::new(id), rescale).await?;
    metrics::record_rerender();
    Ok(Json(LayerResponse::from(&layer)))
}

/// GET /layers/:id/image.png - Current rendered image
pub async fn image_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let layer = find_layer(&state, &LayerId::new(id))?;
    let Some(loaded) = layer.loaded() else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("layer {} is {}", layer.id, layer.state.name()),
        ));
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        loaded.png.clone(),
    )
        .into_response())
}

/// GET /layers/:id/sample?lng=&lat= - Hover value
pub async fn sample_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Query(point): Query<PointQuery>,
) -> Result<Json<SampleResponse>, ApiError> {
    let id = LayerId::new(id);
    if !state.registry.contains(&id) {
        return Err(RegistryError::NotFound(id).into());
    }
    let value = state.registry.sample_fast(&id, point.lng, point.lat);
    metrics::record_sample(false, value.is_some());
    Ok(Json(SampleResponse { value }))
}

/// GET /layers/:id/detail?lng=&lat= - Click value with confidence interval
#[instrument(skip(state))]
pub async fn detail_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Query(point): Query<PointQuery>,
) -> Result<Json<DetailResponse>, ApiError> {
    let layer = find_layer(&state, &LayerId::new(id))?;
    let value = state.registry.sample(&layer.id, point.lng, point.lat);
    metrics::record_sample(true, value.is_some());

    let ci = match value {
        Some(prevalence) => {
            let ci = state
                .se_cache
                .confidence_interval(&layer.url, prevalence, point.lng, point.lat)
                .await;
            metrics::record_ci_query(ci.is_some());
            ci
        }
        None => None,
    };

    Ok(Json(DetailResponse { value, ci }))
}

/// POST /categories - Show exactly the selected layers
#[instrument(skip(state, request), fields(selected = request.visible_ids.len()))]
pub async fn categories_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CategoryRequest>,
) -> Json<CategoryResponse> {
    let selected: HashSet<LayerId> = request.visible_ids.into_iter().collect();
    let loading = state.registry.apply_category_filter(&selected);
    state.spawn_loads(loading.clone());

    let visible = state
        .registry
        .list()
        .into_iter()
        .filter(|layer| layer.visible)
        .map(|layer| layer.id)
        .collect();

    Json(CategoryResponse { visible, loading })
}

fn load_error(state: &AppState, id: &LayerId, error: RegistryError) -> ApiError {
    match (error, state.registry.get(id)) {
        (RegistryError::Raster(raster), Some(layer)) => ApiError::raster(&raster, &layer.name),
        (other, _) => other.into(),
    }
}

fn find_layer(state: &AppState, id: &LayerId) -> Result<RasterLayer, ApiError> {
    state
        .registry
        .get(id)
        .ok_or_else(|| RegistryError::NotFound(id.clone()).into())
}
