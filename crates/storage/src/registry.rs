//! Keyed store of raster layers.
//!
//! Entries are keyed by a [`LayerId`] derived from the source URL, so
//! registering the same URL twice is idempotent. Loads run on spawned tasks
//! and are shared: any number of concurrent load requests for one id wait
//! on the same fetch. Readers receive snapshots; a loaded layer's grid and
//! rendered image are never mutated, only replaced.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use raster_common::{BoundingBox, CrsCode, LayerId, RasterError, RasterGrid, RasterResult};
use renderer::{materialize, RenderOptions, RenderStats, Rescale, RgbaImage};
use tracing::{debug, info, instrument, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::source::{LoadedGrid, RasterSource};

type LoadFuture = Shared<BoxFuture<'static, RasterResult<Arc<LoadedLayer>>>>;

/// What a caller knows about a layer before it is loaded.
#[derive(Debug, Clone)]
pub struct LayerSpec {
    pub url: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub visible: bool,
    pub opacity: f32,
    pub render: RenderOptions,
}

impl LayerSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            category: None,
            visible: true,
            opacity: 1.0,
            render: RenderOptions::default(),
        }
    }

    pub fn id(&self) -> LayerId {
        LayerId::from_url(&self.url)
    }
}

/// A materialized layer. Immutable once built.
#[derive(Debug)]
pub struct LoadedLayer {
    pub grid: RasterGrid,
    pub crs: CrsCode,
    pub image: RgbaImage,
    /// PNG encoding of `image`.
    pub png: Vec<u8>,
    pub rescale: Rescale,
    pub colormap: &'static str,
    pub stats: RenderStats,
    pub warnings: Vec<String>,
    pub rendered_at: DateTime<Utc>,
}

impl LoadedLayer {
    fn build(grid: RasterGrid, crs: CrsCode, warnings: Vec<String>, options: &RenderOptions) -> RasterResult<Self> {
        let materialized = materialize(&grid, options)?;
        let png = materialized.image.to_png()?;
        Ok(Self {
            grid,
            crs,
            image: materialized.image,
            png,
            rescale: materialized.rescale,
            colormap: materialized.colormap,
            stats: materialized.stats,
            warnings,
            rendered_at: Utc::now(),
        })
    }

    fn from_grid(loaded: LoadedGrid, options: &RenderOptions) -> RasterResult<Self> {
        Self::build(loaded.grid, loaded.crs, loaded.warnings, options)
    }

    /// Render the same grid again with different options.
    fn rerender(&self, options: &RenderOptions) -> RasterResult<Self> {
        Self::build(self.grid.clone(), self.crs, self.warnings.clone(), options)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.grid.bounds
    }
}

/// Lifecycle of a registry entry.
#[derive(Debug, Clone)]
pub enum LayerState {
    /// Known by URL only.
    Declared,
    Loading,
    Ready(Arc<LoadedLayer>),
    Failed(RasterError),
}

impl LayerState {
    pub fn name(&self) -> &'static str {
        match self {
            LayerState::Declared => "declared",
            LayerState::Loading => "loading",
            LayerState::Ready(_) => "ready",
            LayerState::Failed(_) => "failed",
        }
    }
}

/// Snapshot of a registry entry.
#[derive(Debug, Clone)]
pub struct RasterLayer {
    pub id: LayerId,
    pub url: String,
    pub name: String,
    pub category: Option<String>,
    pub visible: bool,
    pub opacity: f32,
    pub render: RenderOptions,
    pub state: LayerState,
}

impl RasterLayer {
    fn from_spec(spec: LayerSpec) -> Self {
        let name = spec.name.unwrap_or_else(|| name_from_url(&spec.url));
        Self {
            id: LayerId::from_url(&spec.url),
            url: spec.url,
            name,
            category: spec.category,
            visible: spec.visible,
            opacity: clamp_opacity(spec.opacity),
            render: spec.render,
            state: LayerState::Declared,
        }
    }

    pub fn loaded(&self) -> Option<&Arc<LoadedLayer>> {
        match &self.state {
            LayerState::Ready(loaded) => Some(loaded),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LayerState::Loading)
    }

    pub fn error(&self) -> Option<&RasterError> {
        match &self.state {
            LayerState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Message suitable for showing next to the layer, if it failed.
    pub fn user_error(&self) -> Option<String> {
        self.error().map(|e| e.user_message(&self.name))
    }
}

/// A visible, loaded layer as handed to the map renderer.
#[derive(Debug, Clone)]
pub struct VisibleLayer {
    pub id: LayerId,
    pub name: String,
    pub opacity: f32,
    pub layer: Arc<LoadedLayer>,
}

impl VisibleLayer {
    pub fn bounds(&self) -> BoundingBox {
        self.layer.bounds()
    }
}

#[derive(Default)]
struct LayerTable {
    entries: HashMap<LayerId, RasterLayer>,
    /// Registration order, used for listing.
    order: Vec<LayerId>,
}

impl LayerTable {
    fn iter(&self) -> impl Iterator<Item = &RasterLayer> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}

struct Inner {
    source: Arc<dyn RasterSource>,
    layers: RwLock<LayerTable>,
    in_flight: Mutex<HashMap<LayerId, LoadFuture>>,
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, LayerTable> {
        self.layers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LayerTable> {
        self.layers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<LayerId, LoadFuture>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of a load, then retire its in-flight handle.
    fn commit(&self, id: &LayerId, result: &RasterResult<Arc<LoadedLayer>>) {
        {
            let mut table = self.write();
            match table.entries.get_mut(id) {
                Some(layer) => {
                    layer.state = match result {
                        Ok(loaded) => LayerState::Ready(loaded.clone()),
                        Err(e) => LayerState::Failed(e.clone()),
                    };
                }
                None => debug!(layer = %id, "layer removed while loading, dropping result"),
            }
        }
        self.in_flight().remove(id);
    }

    /// Install a re-rendered image if `options` are still the layer's
    /// current render options. A render for options that have since been
    /// replaced is dropped; the call that replaced them commits its own.
    fn commit_render(&self, id: &LayerId, options: &RenderOptions, rendered: LoadedLayer) -> bool {
        let mut table = self.write();
        match table.entries.get_mut(id) {
            Some(layer) if layer.render == *options => {
                layer.state = LayerState::Ready(Arc::new(rendered));
                true
            }
            Some(_) => {
                debug!(layer = %id, "render options changed while rendering, dropping image");
                false
            }
            None => false,
        }
    }
}

/// Registry of raster layers.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct RasterRegistry {
    inner: Arc<Inner>,
}

impl RasterRegistry {
    pub fn new(source: Arc<dyn RasterSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                layers: RwLock::new(LayerTable::default()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a layer without loading it.
    ///
    /// Registering a URL that is already present leaves the existing entry
    /// untouched.
    pub fn declare(&self, spec: LayerSpec) -> LayerId {
        let id = spec.id();
        let mut table = self.inner.write();
        if !table.entries.contains_key(&id) {
            debug!(layer = %id, url = %spec.url, "declared layer");
            table.order.push(id.clone());
            table.entries.insert(id.clone(), RasterLayer::from_spec(spec));
        }
        id
    }

    /// Register a layer and load it.
    ///
    /// Concurrent upserts of the same URL share a single fetch and end in a
    /// single entry.
    pub async fn upsert(&self, spec: LayerSpec) -> RegistryResult<RasterLayer> {
        let id = self.declare(spec);
        self.load(&id).await?;
        self.get(&id).ok_or(RegistryError::NotFound(id))
    }

    pub fn get(&self, id: &LayerId) -> Option<RasterLayer> {
        self.inner.read().entries.get(id).cloned()
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.inner.read().entries.contains_key(id)
    }

    /// All layers in registration order.
    pub fn list(&self) -> Vec<RasterLayer> {
        self.inner.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a declared layer, or join the load already running for it.
    ///
    /// A layer that is already loaded returns immediately. A layer whose
    /// load failed returns the recorded error; use [`Self::retry`] to
    /// fetch again.
    #[instrument(skip(self, id), fields(layer = %id))]
    pub async fn load(&self, id: &LayerId) -> RegistryResult<Arc<LoadedLayer>> {
        let pending = {
            let mut in_flight = self.inner.in_flight();
            match in_flight.get(id).cloned() {
                Some(pending) => {
                    debug!("joining in-flight load");
                    pending
                }
                None => {
                    let mut table = self.inner.write();
                    let layer = table
                        .entries
                        .get_mut(id)
                        .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
                    match &layer.state {
                        LayerState::Ready(loaded) => return Ok(loaded.clone()),
                        LayerState::Failed(e) => return Err(e.clone().into()),
                        LayerState::Declared | LayerState::Loading => {}
                    }
                    layer.state = LayerState::Loading;
                    let pending = self.spawn_load(id.clone(), layer.url.clone(), layer.render.clone());
                    in_flight.insert(id.clone(), pending.clone());
                    pending
                }
            }
        };

        pending.await.map_err(RegistryError::from)
    }

    /// Clear a recorded failure and load again. A layer that is loaded or
    /// loading behaves as in [`Self::load`].
    pub async fn retry(&self, id: &LayerId) -> RegistryResult<Arc<LoadedLayer>> {
        {
            let mut table = self.inner.write();
            let layer = table
                .entries
                .get_mut(id)
                .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
            if let LayerState::Failed(_) = layer.state {
                layer.state = LayerState::Declared;
            }
        }
        self.load(id).await
    }

    fn spawn_load(&self, id: LayerId, url: String, options: RenderOptions) -> LoadFuture {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            info!(layer = %id, url = %url, "loading layer");
            let result = load_layer(inner.source.as_ref(), &url, options).await;
            match &result {
                Ok(loaded) => info!(
                    layer = %id,
                    width = loaded.grid.width,
                    height = loaded.grid.height,
                    valid = loaded.stats.valid_cells,
                    "layer ready"
                ),
                Err(e) => warn!(layer = %id, url = %url, error = %e, "layer load failed"),
            }
            inner.commit(&id, &result);
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(RasterError::format(format!("load task failed: {}", e))))
        }
        .boxed()
        .shared()
    }

    /// Delete an entry. A load still running for it finishes in the
    /// background and its result is dropped.
    pub fn remove(&self, id: &LayerId) -> Option<RasterLayer> {
        let mut table = self.inner.write();
        let removed = table.entries.remove(id);
        if removed.is_some() {
            table.order.retain(|other| other != id);
            info!(layer = %id, "removed layer");
        }
        removed
    }

    pub fn set_visibility(&self, id: &LayerId, visible: bool) -> RegistryResult<()> {
        self.update(id, |layer| layer.visible = visible)
    }

    /// Set opacity, clamped to `[0, 1]`. Returns the stored value.
    pub fn set_opacity(&self, id: &LayerId, opacity: f32) -> RegistryResult<f32> {
        let opacity = clamp_opacity(opacity);
        self.update(id, |layer| layer.opacity = opacity)?;
        Ok(opacity)
    }

    /// Replace the render options and re-render a layer that is loaded or
    /// loading. The grid is reused; nothing is fetched again.
    pub async fn set_render_options(
        &self,
        id: &LayerId,
        options: RenderOptions,
    ) -> RegistryResult<RasterLayer> {
        let state = {
            let mut table = self.inner.write();
            let layer = table
                .entries
                .get_mut(id)
                .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
            layer.render = options.clone();
            layer.state.clone()
        };

        if matches!(state, LayerState::Ready(_) | LayerState::Loading) {
            let current = self.load(id).await?;
            let render_options = options.clone();
            let rerendered = tokio::task::spawn_blocking(move || current.rerender(&render_options))
                .await
                .map_err(|e| RasterError::format(format!("render task failed: {}", e)))??;
            self.inner.commit_render(id, &options, rerendered);
        }

        self.get(id).ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Change only the rescale range, keeping the colormap.
    pub async fn set_rescale(
        &self,
        id: &LayerId,
        rescale: Option<Rescale>,
    ) -> RegistryResult<RasterLayer> {
        let mut options = self
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?
            .render;
        options.rescale = rescale;
        self.set_render_options(id, options).await
    }

    /// Show exactly the layers in `visible_ids` and hide the rest.
    ///
    /// Returns the visible ids that need a load so the caller can start
    /// them: layers never loaded, and layers whose last load failed. The
    /// recorded failure of a selected layer is cleared.
    pub fn apply_category_filter(&self, visible_ids: &HashSet<LayerId>) -> Vec<LayerId> {
        let mut table = self.inner.write();
        let mut needs_load = Vec::new();
        for (id, layer) in table.entries.iter_mut() {
            layer.visible = visible_ids.contains(id);
            if !layer.visible {
                continue;
            }
            match layer.state {
                LayerState::Declared => needs_load.push(id.clone()),
                LayerState::Failed(_) => {
                    debug!(layer = %id, "selected failed layer, clearing error");
                    layer.state = LayerState::Declared;
                    needs_load.push(id.clone());
                }
                LayerState::Loading | LayerState::Ready(_) => {}
            }
        }
        needs_load.sort();
        needs_load
    }

    /// Visible, loaded layers in registration order.
    pub fn list_visible(&self) -> Vec<VisibleLayer> {
        self.inner
            .read()
            .iter()
            .filter(|layer| layer.visible)
            .filter_map(|layer| {
                layer.loaded().map(|loaded| VisibleLayer {
                    id: layer.id.clone(),
                    name: layer.name.clone(),
                    opacity: layer.opacity,
                    layer: loaded.clone(),
                })
            })
            .collect()
    }

    /// The loaded data for a layer, or `None` if it is not ready.
    pub fn loaded(&self, id: &LayerId) -> Option<Arc<LoadedLayer>> {
        self.inner.read().entries.get(id)?.loaded().cloned()
    }

    /// Hover query. Never fetches; an unloaded layer yields `None`.
    pub fn sample_fast(&self, id: &LayerId, lng: f64, lat: f64) -> Option<f32> {
        let loaded = self.loaded(id)?;
        point_query::sample_fast(&loaded.grid, lng, lat)
    }

    /// Click query with the edge-neighbour fallback. Never fetches.
    pub fn sample(&self, id: &LayerId, lng: f64, lat: f64) -> Option<f32> {
        let loaded = self.loaded(id)?;
        point_query::sample(&loaded.grid, lng, lat)
    }

    fn update(&self, id: &LayerId, apply: impl FnOnce(&mut RasterLayer)) -> RegistryResult<()> {
        let mut table = self.inner.write();
        let layer = table
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        apply(layer);
        Ok(())
    }
}

async fn load_layer(
    source: &dyn RasterSource,
    url: &str,
    options: RenderOptions,
) -> RasterResult<Arc<LoadedLayer>> {
    let loaded = source.load_grid(url).await?;
    let layer = tokio::task::spawn_blocking(move || LoadedLayer::from_grid(loaded, &options))
        .await
        .map_err(|e| RasterError::format(format!("render task failed: {}", e)))??;
    Ok(Arc::new(layer))
}

fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

/// Display name from the last path segment, without query or extension.
fn name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path);
    let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
    if stem.is_empty() {
        url.to_string()
    } else {
        stem.to_string()
    }
}
