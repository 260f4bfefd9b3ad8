//! Layer identifiers.

use serde::{Deserialize, Serialize};

/// Stable identifier for a raster layer, derived from its source URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the id for a source URL.
    ///
    /// The id is the file stem (lowercased, non-alphanumerics folded to `-`)
    /// followed by the CRC32 of the whole URL, e.g. `pfpr-2020-mean-1a2b3c4d`.
    /// The same URL always yields the same id, so registering it twice is
    /// idempotent.
    pub fn from_url(url: &str) -> Self {
        let trimmed = url.trim();
        let path = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or(trimmed)
            .trim_end_matches('/');
        let file = path.rsplit('/').next().unwrap_or(path);
        let stem = match file.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => file,
        };

        let mut slug = String::with_capacity(stem.len());
        for c in stem.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-');
        let slug = if slug.is_empty() { "layer" } else { slug };

        let hash = crc32fast::hash(trimmed.as_bytes());
        Self(format!("{}-{:08x}", slug, hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
