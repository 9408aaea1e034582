//! Engine options and their TOML file form.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::Result;
use crate::metrics::MergeGraphMetrics;

/// Options supplied when building a [`crate::MergeGraphIndex`].
#[derive(Clone)]
pub struct MergeGraphOptions {
    /// Version allowed to rewrite the `body` column. `None` lets every version write.
    pub primary_version: Option<String>,
    /// Maximum number of membership sets kept in the cache.
    pub cache_capacity: usize,
    /// Optional metrics collection implementation.
    pub metrics: Option<Arc<dyn MergeGraphMetrics>>,
}

impl Default for MergeGraphOptions {
    fn default() -> Self {
        Self {
            primary_version: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            metrics: None,
        }
    }
}

impl MergeGraphOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts `body` column repairs to queries against `version`.
    pub fn primary_version(mut self, version: impl Into<String>) -> Self {
        self.primary_version = Some(version.into());
        self
    }

    /// Sets the membership cache capacity.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn MergeGraphMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// File form of [`MergeGraphOptions`].
///
/// ```toml
/// primary_version = "a7f3"
/// cache_capacity = 2000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeGraphConfig {
    /// Version allowed to rewrite the `body` column.
    pub primary_version: Option<String>,
    /// Membership cache capacity; the built-in default when absent.
    pub cache_capacity: Option<usize>,
}

impl MergeGraphConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Converts into options, keeping defaults for unset fields.
    pub fn into_options(self) -> MergeGraphOptions {
        MergeGraphOptions {
            primary_version: self.primary_version.filter(|v| !v.is_empty()),
            cache_capacity: self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            metrics: None,
        }
    }
}
