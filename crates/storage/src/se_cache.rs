//! In-memory LRU cache of standard-error rasters.
//!
//! SE rasters are paired with prevalence rasters by URL and only ever
//! sampled, never drawn, so they live here rather than in the registry.
//! Rasters that fail to decode are cached as unavailable, so a broken SE
//! file costs one fetch rather than one per click. Fetch failures are not
//! cached and the next query tries again.

use lru::LruCache;
use point_query::{compute_ci, sample, ConfidenceInterval, SeNaming};
use raster_common::{RasterError, RasterGrid};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::source::RasterSource;

/// Statistics for the SE cache.
#[derive(Debug, Default, Clone)]
pub struct SeCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Loads that failed, cached or not.
    pub failures: u64,
    pub entries: usize,
}

impl SeCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Cache of SE grids keyed by SE raster URL. `None` marks a failed load.
pub struct SeCache {
    source: Arc<dyn RasterSource>,
    naming: SeNaming,
    cache: RwLock<LruCache<String, Option<Arc<RasterGrid>>>>,
    stats: RwLock<SeCacheStats>,
    capacity: usize,
}

impl SeCache {
    /// Create a cache holding at most `capacity` SE rasters.
    pub fn new(source: Arc<dyn RasterSource>, naming: SeNaming, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            naming,
            cache: RwLock::new(LruCache::new(cap)),
            stats: RwLock::new(SeCacheStats::default()),
            capacity: cap.get(),
        }
    }

    pub fn naming(&self) -> &SeNaming {
        &self.naming
    }

    /// 95% interval around `prevalence` at a point.
    ///
    /// Returns `None` when the URL has no SE pair, the SE raster cannot be
    /// loaded, or the SE raster has no data at the point. Callers show the
    /// bare prevalence value in that case.
    #[instrument(skip(self, prevalence_url))]
    pub async fn confidence_interval(
        &self,
        prevalence_url: &str,
        prevalence: f32,
        lng: f64,
        lat: f64,
    ) -> Option<ConfidenceInterval> {
        let Some(se_url) = self.naming.se_url(prevalence_url) else {
            debug!(url = %prevalence_url, "no standard-error pair for raster");
            return None;
        };
        let grid = self.grid(&se_url).await?;
        let se = sample(&grid, lng, lat)?;
        Some(compute_ci(prevalence as f64, se as f64))
    }

    /// SE grid for `se_url`, loading it on a miss.
    pub async fn grid(&self, se_url: &str) -> Option<Arc<RasterGrid>> {
        let hit = self.cache.write().await.get(se_url).cloned();
        if let Some(entry) = hit {
            self.stats.write().await.hits += 1;
            return entry;
        }

        let (entry, cacheable) = match self.source.load_grid(se_url).await {
            Ok(loaded) => (Some(Arc::new(loaded.grid)), true),
            Err(e @ RasterError::Format(_)) => {
                warn!(url = %se_url, error = %e, "standard-error raster unreadable");
                (None, true)
            }
            Err(e) => {
                warn!(url = %se_url, error = %e, "standard-error raster unreachable");
                (None, false)
            }
        };

        let entries = {
            let mut cache = self.cache.write().await;
            if cacheable {
                cache.put(se_url.to_string(), entry.clone());
            }
            cache.len()
        };

        let mut stats = self.stats.write().await;
        stats.misses += 1;
        if entry.is_none() {
            stats.failures += 1;
        }
        stats.entries = entries;

        entry
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> SeCacheStats {
        self.stats.read().await.clone()
    }

    /// Clear the cache.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        *self.stats.write().await = SeCacheStats::default();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}
