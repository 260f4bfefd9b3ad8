//! Prevalence raster API service library.
//!
//! Serves the layer registry, pixel queries and confidence intervals over
//! HTTP. The router is built here so tests can drive it without a socket.

pub mod config;
pub mod handlers;
pub mod layer_catalog;
pub mod metrics;
pub mod state;

use axum::{
    extract::Extension,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use handlers::{cog, health, layers};
use state::AppState;

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>, prometheus: Option<PrometheusHandle>) -> Router {
    Router::new()
        // Registry
        .route(
            "/layers",
            get(layers::list_layers_handler).post(layers::create_layer_handler),
        )
        .route("/layers/visible", get(layers::visible_layers_handler))
        .route(
            "/layers/:id",
            get(layers::get_layer_handler).delete(layers::delete_layer_handler),
        )
        .route("/layers/:id/visibility", put(layers::visibility_handler))
        .route("/layers/:id/opacity", put(layers::opacity_handler))
        .route("/layers/:id/rescale", put(layers::rescale_handler))
        .route("/layers/:id/retry", post(layers::retry_layer_handler))
        .route("/layers/:id/image.png", get(layers::image_handler))
        .route("/layers/:id/sample", get(layers::sample_handler))
        .route("/layers/:id/detail", get(layers::detail_handler))
        .route("/categories", post(layers::categories_handler))
        // Raster metadata
        .route("/cog/info", get(cog::info_handler))
        .route("/cog/bounds", get(cog::bounds_handler))
        // Health check
        .route("/health", get(health::health_handler))
        // Metrics
        .route("/metrics", get(health::metrics_handler))
        .layer(Extension(state))
        .layer(Extension(prometheus))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
