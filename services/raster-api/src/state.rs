//! Application state and shared resources.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use cog_loader::CogLoader;
use raster_common::LayerId;
use storage::{CogPipeline, RasterRegistry, RasterSource, RegistryResult, SeCache};
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::layer_catalog::LayerCatalog;
use crate::metrics;

/// Shared application state.
pub struct AppState {
    pub config: ServiceConfig,
    pub pipeline: Arc<CogPipeline>,
    pub registry: RasterRegistry,
    pub se_cache: SeCache,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let loader = CogLoader::new(config.loader_config())?;
        let pipeline = Arc::new(CogPipeline::new(loader));
        let source: Arc<dyn RasterSource> = pipeline.clone();

        let registry = RasterRegistry::new(source.clone());
        let se_cache = SeCache::new(source, config.se_naming.clone(), config.se_cache_capacity);

        Ok(Self {
            config,
            pipeline,
            registry,
            se_cache,
        })
    }

    /// Declare every catalog layer. Returns the ids of the visible ones.
    pub fn declare_catalog(&self, catalog: &LayerCatalog) -> Vec<LayerId> {
        let mut visible = Vec::new();
        for spec in catalog.specs(&self.config.default_colormap) {
            let is_visible = spec.visible;
            let id = self.registry.declare(spec);
            if is_visible {
                visible.push(id);
            }
        }
        info!(
            declared = self.registry.len(),
            visible = visible.len(),
            "Declared catalog layers"
        );
        visible
    }

    /// Load a layer, recording timing and outcome.
    pub async fn load_layer(&self, id: &LayerId) -> RegistryResult<()> {
        load_with_metrics(&self.registry, id, false).await
    }

    /// Load a layer, fetching again if its last load failed.
    pub async fn retry_layer(&self, id: &LayerId) -> RegistryResult<()> {
        load_with_metrics(&self.registry, id, true).await
    }

    /// Start loading layers in the background.
    pub fn spawn_loads(&self, ids: Vec<LayerId>) {
        for id in ids {
            let registry = self.registry.clone();
            tokio::spawn(async move {
                if let Err(e) = load_with_metrics(&registry, &id, false).await {
                    warn!(layer = %id, error = %e, "Background load failed");
                }
            });
        }
    }
}

async fn load_with_metrics(registry: &RasterRegistry, id: &LayerId, retry: bool) -> RegistryResult<()> {
    let start = Instant::now();
    let result = if retry {
        registry.retry(id).await
    } else {
        registry.load(id).await
    };
    metrics::record_layer_load(result.is_ok(), start.elapsed().as_secs_f64() * 1000.0);
    result.map(|_| ())
}
