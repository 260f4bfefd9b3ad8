//! The COG loader: fetch, decode band 0, derive native bounds.

use projection::GeoKeys;
use raster_common::{BoundingBox, CrsCode, RasterError, RasterResult};
use tracing::{info, instrument};

use crate::bounds_service::BoundsService;
use crate::decode::{decode, TiffInfo};
use crate::error::LoaderError;
use crate::fetch::{FetchConfig, RangeFetcher};
use crate::georef::native_bounds;

/// Loader configuration.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    pub fetch: FetchConfig,
    /// Tile-metadata endpoint consulted for bounds, if any.
    pub bounds_service_url: Option<String>,
}

/// A decoded raster ready for normalization.
#[derive(Debug, Clone)]
pub struct CogImage {
    pub url: String,
    /// Image file directory summary.
    pub info: TiffInfo,
    pub geo_keys: GeoKeys,
    /// Band 0, row-major from the top-left.
    pub samples: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// Bounds in the raster's native CRS.
    pub native_bounds: BoundingBox,
    /// WGS84 bounds reported by the bounds service, when it answered.
    pub service_bounds: Option<BoundingBox>,
    /// Declared GDAL no-data value; those cells are already NaN in `samples`.
    pub nodata: Option<f64>,
    pub range_reads: bool,
    /// Non-fatal caveats (extra bands, ignored rotation).
    pub warnings: Vec<String>,
}

impl CogImage {
    pub fn crs(&self) -> CrsCode {
        self.geo_keys.crs()
    }
}

/// Fetches and decodes remote GeoTIFFs.
#[derive(Debug, Clone)]
pub struct CogLoader {
    fetcher: RangeFetcher,
    bounds_service: Option<BoundsService>,
}

impl CogLoader {
    pub fn new(config: LoaderConfig) -> Result<Self, LoaderError> {
        let fetcher = RangeFetcher::new(config.fetch)?;
        let bounds_service = config
            .bounds_service_url
            .map(|endpoint| BoundsService::new(fetcher.client().clone(), endpoint));
        Ok(Self {
            fetcher,
            bounds_service,
        })
    }

    /// Fetch and decode a raster.
    ///
    /// Fails with a fetch error when the URL cannot be read and a format
    /// error when the bytes are not a decodable, geo-referenced TIFF.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn load(&self, url: &str) -> RasterResult<CogImage> {
        let bounds_lookup = async {
            match &self.bounds_service {
                Some(service) => service.fetch_bounds(url).await,
                None => None,
            }
        };
        let (fetched, service_bounds) = tokio::join!(self.fetcher.fetch(url), bounds_lookup);
        let fetched = fetched?;

        let owned_url = url.to_string();
        let bytes = fetched.bytes;
        let mut image = tokio::task::spawn_blocking(move || Self::decode_bytes(&owned_url, &bytes))
            .await
            .map_err(|e| RasterError::format(format!("decode task failed: {}", e)))??;

        image.range_reads = fetched.range_reads;
        image.service_bounds = service_bounds;

        info!(
            width = image.width,
            height = image.height,
            crs = %image.crs(),
            range_reads = image.range_reads,
            "loaded raster"
        );
        Ok(image)
    }

    /// Decode raster bytes already in memory.
    pub fn decode_bytes(url: &str, bytes: &[u8]) -> RasterResult<CogImage> {
        let tiff = decode(bytes)?;
        let (native_bounds, bounds_warnings) = native_bounds(&tiff)?;

        let mut warnings = tiff.warnings;
        warnings.extend(bounds_warnings);

        Ok(CogImage {
            url: url.to_string(),
            info: tiff.info,
            geo_keys: tiff.geo_keys,
            samples: tiff.samples,
            width: tiff.width as usize,
            height: tiff.height as usize,
            native_bounds,
            service_bounds: None,
            nodata: tiff.nodata,
            range_reads: false,
            warnings,
        })
    }
}
