//! HTTP handlers.
//!
//! - [`layers`] - registry endpoints used by the map client
//! - [`cog`] - raster metadata and bounds for arbitrary URLs
//! - [`health`] - health and Prometheus metrics

pub mod cog;
pub mod health;
pub mod layers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use raster_common::RasterError;
use serde::Serialize;
use storage::RegistryError;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A handler error carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// A raster failure, worded for the named layer.
    pub fn raster(error: &RasterError, layer_name: &str) -> Self {
        Self::new(status_for(error.http_status_code()), error.user_message(layer_name))
    }
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        Self::new(status_for(error.http_status_code()), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn status_for(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
