//! Tests for the layer registry and the standard-error cache.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use point_query::{compute_ci, SeNaming};
use raster_common::{BoundingBox, CrsCode, IndexSpace, LayerId, RasterError, RasterGrid, RasterResult};
use renderer::Rescale;
use storage::{LayerSpec, LayerState, LoadedGrid, RasterRegistry, RasterSource, RegistryError, SeCache};
use test_utils::{create_constant_grid, create_prevalence_grid, UNIT_10};

const PREVALENCE_URL: &str = "https://rasters.example.org/pfpr/PfPR_2020_mean.tif";
const OTHER_URL: &str = "https://rasters.example.org/pfpr/PvPR_2020_mean.tif";
const MISSING_URL: &str = "https://rasters.example.org/pfpr/missing_mean.tif";
const CORRUPT_URL: &str = "https://rasters.example.org/pfpr/corrupt_mean.tif";
const ZEROS_URL: &str = "https://rasters.example.org/pfpr/zeros_mean.tif";

/// In-memory source that counts fetches per URL.
///
/// URLs containing `missing` fail to fetch, `corrupt` fail to decode,
/// `zeros` are all no-data and `_SE` are a constant 5%.
struct MockSource {
    delay: Duration,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MockSource {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            fetches: Mutex::new(HashMap::new()),
        })
    }

    fn fetches(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl RasterSource for MockSource {
    async fn load_grid(&self, url: &str) -> RasterResult<LoadedGrid> {
        *self.fetches.lock().unwrap().entry(url.to_string()).or_default() += 1;
        tokio::time::sleep(self.delay).await;

        if url.contains("missing") {
            return Err(RasterError::fetch(url, "HTTP 404 Not Found"));
        }
        if url.contains("corrupt") {
            return Err(RasterError::format("not a TIFF file"));
        }

        let data = if url.contains("zeros") {
            create_constant_grid(10, 10, 0.0)
        } else if url.contains("_SE") {
            create_constant_grid(10, 10, 5.0)
        } else {
            create_prevalence_grid(10, 10)
        };
        let grid = RasterGrid::new(
            10,
            10,
            data,
            BoundingBox::from_array(UNIT_10),
            IndexSpace::Geographic,
        )?;
        Ok(LoadedGrid {
            grid,
            crs: CrsCode::Epsg4326,
            warnings: Vec::new(),
        })
    }
}

fn registry_with(source: &Arc<MockSource>) -> RasterRegistry {
    RasterRegistry::new(source.clone())
}

// ============================================================================
// Registration tests
// ============================================================================

#[tokio::test]
async fn test_declare_is_idempotent() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);

    let a = registry.declare(LayerSpec::new(PREVALENCE_URL));
    let b = registry.declare(LayerSpec {
        name: Some("Renamed".into()),
        ..LayerSpec::new(PREVALENCE_URL)
    });

    assert_eq!(a, b);
    assert_eq!(registry.len(), 1);
    let layer = registry.get(&a).unwrap();
    assert_eq!(layer.name, "PfPR_2020_mean");
    assert!(matches!(layer.state, LayerState::Declared));
    assert_eq!(source.total_fetches(), 0);
}

#[tokio::test]
async fn test_list_keeps_registration_order() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);

    registry.declare(LayerSpec::new(OTHER_URL));
    registry.declare(LayerSpec::new(PREVALENCE_URL));

    let urls: Vec<String> = registry.list().into_iter().map(|l| l.url).collect();
    assert_eq!(urls, vec![OTHER_URL.to_string(), PREVALENCE_URL.to_string()]);
}

#[tokio::test]
async fn test_query_before_load_never_fetches() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    let id = registry.declare(LayerSpec::new(PREVALENCE_URL));

    assert_eq!(registry.sample_fast(&id, 5.5, 5.5), None);
    assert_eq!(registry.sample(&id, 5.5, 5.5), None);
    assert_eq!(registry.sample(&LayerId::new("unknown"), 5.5, 5.5), None);
    assert_eq!(source.total_fetches(), 0);
}

// ============================================================================
// Load tests
// ============================================================================

#[tokio::test]
async fn test_upsert_loads_and_renders() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);

    let layer = registry.upsert(LayerSpec::new(PREVALENCE_URL)).await.unwrap();
    let loaded = layer.loaded().expect("layer should be ready");

    assert_eq!(loaded.bounds().to_array(), UNIT_10);
    assert_eq!(loaded.image.width, 10);
    assert_eq!(loaded.image.height, 10);
    assert_eq!(&loaded.png[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
    assert_eq!(loaded.colormap, "viridis");
    assert!(registry.sample(&layer.id, 5.5, 5.5).is_some());
    assert_eq!(registry.sample(&layer.id, 50.0, 5.5), None);
}

#[tokio::test]
async fn test_concurrent_upserts_fetch_once() {
    let source = MockSource::new(Duration::from_millis(50));
    let registry = registry_with(&source);

    let (a, b) = tokio::join!(
        registry.upsert(LayerSpec::new(PREVALENCE_URL)),
        registry.upsert(LayerSpec::new(PREVALENCE_URL)),
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(source.fetches(PREVALENCE_URL), 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_upserts_across_tasks_fetch_once() {
    let source = MockSource::new(Duration::from_millis(20));
    let registry = registry_with(&source);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.upsert(LayerSpec::new(PREVALENCE_URL)).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(source.fetches(PREVALENCE_URL), 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_distinct_layers_load_independently() {
    let source = MockSource::new(Duration::from_millis(10));
    let registry = registry_with(&source);

    let (good, bad) = tokio::join!(
        registry.upsert(LayerSpec::new(PREVALENCE_URL)),
        registry.upsert(LayerSpec::new(MISSING_URL)),
    );

    assert!(good.is_ok());
    assert!(matches!(bad, Err(RegistryError::Raster(RasterError::Fetch { .. }))));
    assert!(registry.loaded(&LayerId::from_url(PREVALENCE_URL)).is_some());
}

#[tokio::test]
async fn test_failed_load_is_recorded() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    let id = registry.declare(LayerSpec {
        name: Some("Broken layer".into()),
        ..LayerSpec::new(CORRUPT_URL)
    });

    let err = registry.load(&id).await.unwrap_err();
    assert_eq!(err.http_status_code(), 422);

    let layer = registry.get(&id).unwrap();
    assert!(matches!(layer.state, LayerState::Failed(RasterError::Format(_))));
    assert!(layer.user_error().unwrap().contains("Broken layer"));

    // Loading again reports the recorded error without fetching.
    assert!(registry.load(&id).await.is_err());
    assert_eq!(source.fetches(CORRUPT_URL), 1);

    // Retry fetches again.
    assert!(registry.retry(&id).await.is_err());
    assert_eq!(source.fetches(CORRUPT_URL), 2);
}

#[tokio::test]
async fn test_load_unknown_layer() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);

    let err = registry.load(&LayerId::new("nope")).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
    assert_eq!(err.http_status_code(), 404);
}

#[tokio::test]
async fn test_all_nodata_layer_is_transparent() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);

    let layer = registry.upsert(LayerSpec::new(ZEROS_URL)).await.unwrap();
    let loaded = layer.loaded().unwrap();

    assert_eq!(loaded.image.width, 10);
    assert_eq!(loaded.image.height, 10);
    assert!(loaded.image.is_fully_transparent());
    assert_eq!(registry.sample(&layer.id, 5.5, 5.5), None);
}

// ============================================================================
// Mutation tests
// ============================================================================

#[tokio::test]
async fn test_visibility_and_opacity_do_not_refetch() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    let layer = registry.upsert(LayerSpec::new(PREVALENCE_URL)).await.unwrap();
    let before = registry.loaded(&layer.id).unwrap();

    registry.set_visibility(&layer.id, false).unwrap();
    assert!(registry.list_visible().is_empty());

    registry.set_visibility(&layer.id, true).unwrap();
    assert_eq!(registry.set_opacity(&layer.id, 1.7).unwrap(), 1.0);
    assert_eq!(registry.set_opacity(&layer.id, 0.25).unwrap(), 0.25);

    let visible = registry.list_visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].opacity, 0.25);
    assert_eq!(visible[0].bounds().to_array(), UNIT_10);
    assert!(Arc::ptr_eq(&visible[0].layer, &before));
    assert_eq!(source.fetches(PREVALENCE_URL), 1);
}

#[tokio::test]
async fn test_list_visible_skips_unloaded_layers() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    registry.declare(LayerSpec::new(OTHER_URL));
    registry.upsert(LayerSpec::new(PREVALENCE_URL)).await.unwrap();

    let visible = registry.list_visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, LayerId::from_url(PREVALENCE_URL));
}

#[tokio::test]
async fn test_rescale_rerenders_without_refetch() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    let layer = registry.upsert(LayerSpec::new(PREVALENCE_URL)).await.unwrap();
    let before = registry.loaded(&layer.id).unwrap();

    let updated = registry
        .set_rescale(&layer.id, Some(Rescale::new(0.0, 100.0)))
        .await
        .unwrap();
    let after = updated.loaded().unwrap();

    assert_eq!(after.rescale, Rescale::new(0.0, 100.0));
    assert_ne!(after.image, before.image);
    assert!(Arc::ptr_eq(&after.grid.data, &before.grid.data));
    assert_eq!(source.fetches(PREVALENCE_URL), 1);
}

#[tokio::test]
async fn test_rescale_before_load_is_used_by_load() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    let id = registry.declare(LayerSpec::new(PREVALENCE_URL));

    registry
        .set_rescale(&id, Some(Rescale::new(0.0, 80.0)))
        .await
        .unwrap();
    assert_eq!(source.total_fetches(), 0);

    let loaded = registry.load(&id).await.unwrap();
    assert_eq!(loaded.rescale, Rescale::new(0.0, 80.0));
}

#[tokio::test]
async fn test_category_filter() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    let loaded_id = registry
        .upsert(LayerSpec::new(PREVALENCE_URL))
        .await
        .unwrap()
        .id;
    let declared_id = registry.declare(LayerSpec {
        visible: false,
        ..LayerSpec::new(OTHER_URL)
    });

    let selection: HashSet<LayerId> = [declared_id.clone()].into_iter().collect();
    let needs_load = registry.apply_category_filter(&selection);

    assert_eq!(needs_load, vec![declared_id.clone()]);
    assert!(!registry.get(&loaded_id).unwrap().visible);
    assert!(registry.get(&declared_id).unwrap().visible);
    assert_eq!(source.fetches(PREVALENCE_URL), 1);
}

#[tokio::test]
async fn test_category_filter_retries_failed_layers() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    let failed_id = registry.declare(LayerSpec::new(MISSING_URL));
    assert!(registry.load(&failed_id).await.is_err());

    let selection: HashSet<LayerId> = [failed_id.clone()].into_iter().collect();
    let needs_load = registry.apply_category_filter(&selection);

    assert_eq!(needs_load, vec![failed_id.clone()]);
    assert!(matches!(registry.get(&failed_id).unwrap().state, LayerState::Declared));

    // The next load fetches again.
    assert!(registry.load(&failed_id).await.is_err());
    assert_eq!(source.fetches(MISSING_URL), 2);

    // Hidden failed layers are left alone.
    let needs_load = registry.apply_category_filter(&HashSet::new());
    assert!(needs_load.is_empty());
    assert!(registry.get(&failed_id).unwrap().error().is_some());
}

#[tokio::test]
async fn test_remove() {
    let source = MockSource::new(Duration::ZERO);
    let registry = registry_with(&source);
    let id = registry.upsert(LayerSpec::new(PREVALENCE_URL)).await.unwrap().id;
    let snapshot = registry.loaded(&id).unwrap();

    assert!(registry.remove(&id).is_some());
    assert!(registry.get(&id).is_none());
    assert_eq!(registry.sample_fast(&id, 5.5, 5.5), None);
    assert!(matches!(
        registry.set_visibility(&id, true),
        Err(RegistryError::NotFound(_))
    ));
    assert!(registry.list().is_empty());

    // Snapshots handed out earlier stay valid.
    assert_eq!(snapshot.grid.width, 10);
}

#[tokio::test]
async fn test_remove_while_loading_drops_result() {
    let source = MockSource::new(Duration::from_millis(30));
    let registry = registry_with(&source);
    let id = registry.declare(LayerSpec::new(PREVALENCE_URL));

    let loading = {
        let registry = registry.clone();
        let id = id.clone();
        tokio::spawn(async move { registry.load(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    registry.remove(&id);

    assert!(loading.await.unwrap().is_ok());
    assert!(registry.get(&id).is_none());
    assert!(registry.is_empty());
}

// ============================================================================
// Standard-error cache tests
// ============================================================================

#[tokio::test]
async fn test_confidence_interval_from_paired_raster() {
    let source = MockSource::new(Duration::ZERO);
    let cache = SeCache::new(source.clone(), SeNaming::default(), 4);

    let ci = cache
        .confidence_interval(PREVALENCE_URL, 50.0, 5.5, 5.5)
        .await
        .unwrap();
    assert_eq!(ci, compute_ci(50.0, 5.0));
    assert!((ci.lower - 40.2).abs() < 1e-6);
    assert!((ci.upper - 59.8).abs() < 1e-6);

    // A second point on the same layer reuses the decoded SE grid.
    assert!(cache
        .confidence_interval(PREVALENCE_URL, 30.0, 2.5, 7.5)
        .await
        .is_some());
    let se_url = "https://rasters.example.org/pfpr/PfPR_2020_SE.tif";
    assert_eq!(source.fetches(se_url), 1);

    let stats = cache.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_confidence_interval_without_pair() {
    let source = MockSource::new(Duration::ZERO);
    let cache = SeCache::new(source.clone(), SeNaming::default(), 4);

    let ci = cache
        .confidence_interval("https://rasters.example.org/pfpr/incidence.tif", 50.0, 5.5, 5.5)
        .await;
    assert!(ci.is_none());
    assert_eq!(source.total_fetches(), 0);
}

#[tokio::test]
async fn test_confidence_interval_outside_raster() {
    let source = MockSource::new(Duration::ZERO);
    let cache = SeCache::new(source.clone(), SeNaming::default(), 4);

    let ci = cache
        .confidence_interval(PREVALENCE_URL, 50.0, 40.0, 40.0)
        .await;
    assert!(ci.is_none());
}

#[tokio::test]
async fn test_unreadable_se_raster_is_cached() {
    let source = MockSource::new(Duration::ZERO);
    let cache = SeCache::new(source.clone(), SeNaming::default(), 4);

    for _ in 0..3 {
        assert!(cache
            .confidence_interval(CORRUPT_URL, 50.0, 5.5, 5.5)
            .await
            .is_none());
    }

    let se_url = "https://rasters.example.org/pfpr/corrupt_SE.tif";
    assert_eq!(source.fetches(se_url), 1);
    assert_eq!(cache.stats().await.failures, 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_unreachable_se_raster_is_retried() {
    let source = MockSource::new(Duration::ZERO);
    let cache = SeCache::new(source.clone(), SeNaming::default(), 4);

    for _ in 0..3 {
        assert!(cache
            .confidence_interval(MISSING_URL, 50.0, 5.5, 5.5)
            .await
            .is_none());
    }

    let se_url = "https://rasters.example.org/pfpr/missing_SE.tif";
    assert_eq!(source.fetches(se_url), 3);
    assert_eq!(cache.stats().await.failures, 3);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_se_cache_eviction() {
    let source = MockSource::new(Duration::ZERO);
    let cache = SeCache::new(source.clone(), SeNaming::default(), 1);

    cache.confidence_interval(PREVALENCE_URL, 50.0, 5.5, 5.5).await;
    cache.confidence_interval(OTHER_URL, 50.0, 5.5, 5.5).await;
    cache.confidence_interval(PREVALENCE_URL, 50.0, 5.5, 5.5).await;

    assert_eq!(cache.len().await, 1);
    assert_eq!(source.fetches("https://rasters.example.org/pfpr/PfPR_2020_SE.tif"), 2);
}
