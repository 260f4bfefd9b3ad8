//! Load pipeline: fetch, decode and normalize a raster into a grid.

use async_trait::async_trait;
use cog_loader::{CogImage, CogLoader};
use projection::{normalize, normalize_with_crs};
use raster_common::{CrsCode, RasterGrid, RasterResult};
use tracing::{debug, instrument};

/// A decoded raster placed in WGS84, ready to be materialized or sampled.
#[derive(Debug, Clone)]
pub struct LoadedGrid {
    pub grid: RasterGrid,
    /// CRS of the source raster.
    pub crs: CrsCode,
    /// Loader and normalizer warnings, in the order they fired.
    pub warnings: Vec<String>,
}

/// Something that can turn a raster URL into a [`LoadedGrid`].
///
/// The registry and the standard-error cache only see this trait, so tests
/// can substitute an in-memory source.
#[async_trait]
pub trait RasterSource: Send + Sync {
    async fn load_grid(&self, url: &str) -> RasterResult<LoadedGrid>;
}

/// [`RasterSource`] backed by HTTP COG reads.
pub struct CogPipeline {
    loader: CogLoader,
}

impl CogPipeline {
    pub fn new(loader: CogLoader) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &CogLoader {
        &self.loader
    }
}

#[async_trait]
impl RasterSource for CogPipeline {
    #[instrument(skip(self))]
    async fn load_grid(&self, url: &str) -> RasterResult<LoadedGrid> {
        let image = self.loader.load(url).await?;
        grid_from_image(image)
    }
}

/// Normalize a decoded image into a grid.
///
/// The bounds service is a fallback. Its box (WGS84) is used for placement
/// only when the file's own bounds were estimated, and never when it is an
/// estimate itself, such as an exactly global box.
pub fn grid_from_image(image: CogImage) -> RasterResult<LoadedGrid> {
    let crs = image.crs();
    let normalized = normalize(&image.native_bounds, &image.geo_keys);

    let mut warnings = image.warnings;
    warnings.extend(normalized.warnings);

    let mut bounds = normalized.bounds;
    if let Some(service_bounds) = image.service_bounds {
        let placed = normalize_with_crs(&service_bounds, CrsCode::Epsg4326);
        if normalized.estimated && !placed.estimated {
            debug!(
                file = ?bounds.to_array(),
                service = ?placed.bounds.to_array(),
                "using bounds service placement"
            );
            warnings.push(format!(
                "raster bounds unavailable, placed using bounds service extent {:?}",
                placed.bounds.to_array()
            ));
            bounds = placed.bounds;
        } else {
            debug!(service = ?service_bounds.to_array(), "bounds service extent not needed");
        }
    }

    let grid = RasterGrid::new(
        image.width,
        image.height,
        image.samples,
        bounds,
        normalized.index_space,
    )?;

    Ok(LoadedGrid {
        grid,
        crs,
        warnings,
    })
}
