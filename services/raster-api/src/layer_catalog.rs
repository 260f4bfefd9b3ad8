//! Static layer catalog.
//!
//! Layers declared up front are read from a YAML file:
//!
//! ```yaml
//! layers:
//!   - url: https://rasters.example.org/pfpr/PfPR_2020_mean.tif
//!     title: P. falciparum prevalence 2020
//!     category: malaria
//!     visible: true
//!     opacity: 0.8
//!     rescale: [0, 60]
//!     colormap: viridis
//! ```

use std::fs;
use std::path::Path;

use renderer::{RenderOptions, Rescale};
use serde::Deserialize;
use storage::LayerSpec;
use tracing::{info, warn};

/// One declared layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogLayer {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// `[min, max]`; detected from the data when absent.
    #[serde(default)]
    pub rescale: Option<[f32; 2]>,
    #[serde(default)]
    pub colormap: Option<String>,
}

fn default_visible() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

impl CatalogLayer {
    pub fn to_spec(&self, default_colormap: &str) -> LayerSpec {
        LayerSpec {
            url: self.url.clone(),
            name: self.title.clone(),
            category: self.category.clone(),
            visible: self.visible,
            opacity: self.opacity,
            render: RenderOptions {
                colormap: self
                    .colormap
                    .clone()
                    .unwrap_or_else(|| default_colormap.to_string()),
                rescale: self.rescale.map(|[min, max]| Rescale::new(min, max)),
                debug: false,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerCatalog {
    #[serde(default)]
    pub layers: Vec<CatalogLayer>,
}

impl LayerCatalog {
    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Load a catalog file. A missing or unreadable file yields an empty
    /// catalog.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, path = ?path, "Failed to read layer catalog");
                return Self::default();
            }
        };

        match Self::parse(&contents) {
            Ok(catalog) => {
                info!(path = ?path, layers = catalog.layers.len(), "Loaded layer catalog");
                catalog
            }
            Err(e) => {
                warn!(error = %e, path = ?path, "Failed to parse layer catalog");
                Self::default()
            }
        }
    }

    pub fn specs(&self, default_colormap: &str) -> Vec<LayerSpec> {
        self.layers
            .iter()
            .map(|layer| layer.to_spec(default_colormap))
            .collect()
    }
}
