//! Optional tile-metadata service used as a bounds source.
//!
//! The service answers `GET {endpoint}?url=<raster url>` with
//! `{"bounds": [west, south, east, north]}` in WGS84. It is advisory: any
//! failure is logged and reported as `None`, and the caller keeps the
//! bounds from its own TIFF parse.

use raster_common::BoundingBox;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct BoundsResponse {
    bounds: Vec<f64>,
}

/// Client for a tile-metadata bounds endpoint.
#[derive(Debug, Clone)]
pub struct BoundsService {
    client: Client,
    endpoint: String,
}

impl BoundsService {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the service for a raster's bounds.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn fetch_bounds(&self, raster_url: &str) -> Option<BoundingBox> {
        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("url", raster_url)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "bounds service unreachable");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "bounds service returned an error");
            return None;
        }

        let parsed: BoundsResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "bounds service returned malformed JSON");
                return None;
            }
        };

        match parsed.bounds.as_slice() {
            [w, s, e, n] if [w, s, e, n].iter().all(|v| v.is_finite()) => {
                debug!(bounds = ?parsed.bounds, "bounds from service");
                Some(BoundingBox::new(*w, *s, *e, *n))
            }
            other => {
                warn!(bounds = ?other, "bounds service returned unusable bounds");
                None
            }
        }
    }
}
