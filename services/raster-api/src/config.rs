//! Service configuration from environment variables.

use std::env;
use std::time::Duration;

use cog_loader::{FetchConfig, LoaderConfig};
use point_query::SeNaming;
use tracing::warn;

/// Runtime settings for the raster service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub fetch_timeout: Duration,
    pub header_bytes: usize,
    /// Tile-metadata endpoint queried for bounds. Disabled when unset.
    pub bounds_service_url: Option<String>,
    pub se_cache_capacity: usize,
    pub default_colormap: String,
    pub se_naming: SeNaming,
    /// Load every visible catalog layer at start-up.
    pub preload: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            header_bytes: 64 * 1024,
            bounds_service_url: None,
            se_cache_capacity: 16,
            default_colormap: "viridis".to_string(),
            se_naming: SeNaming::default(),
            preload: true,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let se_defaults = defaults.se_naming.clone();

        Self {
            fetch_timeout: parse_or(&lookup, "RASTER_FETCH_TIMEOUT_SECS", 30u64)
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            header_bytes: parse_or(&lookup, "RASTER_HEADER_BYTES", defaults.header_bytes)
                .unwrap_or(defaults.header_bytes),
            bounds_service_url: lookup("RASTER_BOUNDS_SERVICE_URL").filter(|s| !s.trim().is_empty()),
            se_cache_capacity: parse_or(&lookup, "RASTER_SE_CACHE_CAPACITY", defaults.se_cache_capacity)
                .unwrap_or(defaults.se_cache_capacity),
            default_colormap: lookup("RASTER_DEFAULT_COLORMAP").unwrap_or(defaults.default_colormap),
            se_naming: SeNaming::new(
                lookup("RASTER_PREVALENCE_SUFFIX").unwrap_or(se_defaults.prevalence_token),
                lookup("RASTER_SE_SUFFIX").unwrap_or(se_defaults.se_token),
            ),
            preload: parse_or(&lookup, "RASTER_PRELOAD", defaults.preload).unwrap_or(defaults.preload),
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            fetch: FetchConfig {
                request_timeout: self.fetch_timeout,
                header_bytes: self.header_bytes,
                ..FetchConfig::default()
            },
            bounds_service_url: self.bounds_service_url.clone(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Option<T> {
    match lookup(key) {
        None => Some(default),
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key = key, value = %raw, "invalid value, using default");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.header_bytes, 65536);
        assert!(config.bounds_service_url.is_none());
        assert_eq!(config.se_cache_capacity, 16);
        assert_eq!(config.default_colormap, "viridis");
        assert_eq!(config.se_naming, SeNaming::default());
        assert!(config.preload);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("RASTER_FETCH_TIMEOUT_SECS", "5"),
            ("RASTER_BOUNDS_SERVICE_URL", "http://tiles.internal/cog/bounds"),
            ("RASTER_SE_SUFFIX", "_stderr"),
            ("RASTER_PRELOAD", "false"),
        ]));
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(
            config.bounds_service_url.as_deref(),
            Some("http://tiles.internal/cog/bounds")
        );
        assert_eq!(config.se_naming.se_token, "_stderr");
        assert_eq!(config.se_naming.prevalence_token, "_mean");
        assert!(!config.preload);

        let loader = config.loader_config();
        assert_eq!(loader.fetch.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("RASTER_SE_CACHE_CAPACITY", "lots"),
            ("RASTER_BOUNDS_SERVICE_URL", "  "),
        ]));
        assert_eq!(config.se_cache_capacity, 16);
        assert!(config.bounds_service_url.is_none());
    }
}
