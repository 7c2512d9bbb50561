//! Configuration types for BDL compilation.
//!
//! All types implement [`serde::Deserialize`] with every field defaulted,
//! so a configuration file only needs to mention what it changes.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration.
//! - [`CacheConfig`] - Whether and where compiled units are cached.
//! - [`IncludeConfig`] - Directories searched by `use` directives.
//! - [`CompositionConfig`] - Targets produced by the composition stage.
//!
//! # Example
//!
//! ```
//! # use bdl::config::AppConfig;
//! let config = AppConfig::default();
//! assert!(config.cache().enabled());
//! assert_eq!(config.composition().targets(), ["default"]);
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default location of the cache artifact, `{}` being the source path.
pub const DEFAULT_PREPROCESS_FORMAT: &str = "{}.o";

/// Target used when none is requested.
pub const DEFAULT_TARGET: &str = "default";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    cache: CacheConfig,

    #[serde(default)]
    include: IncludeConfig,

    #[serde(default)]
    composition: CompositionConfig,
}

impl AppConfig {
    pub fn new(cache: CacheConfig, include: IncludeConfig, composition: CompositionConfig) -> Self {
        Self {
            cache,
            include,
            composition,
        }
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    pub fn include(&self) -> &IncludeConfig {
        &self.include
    }

    pub fn composition(&self) -> &CompositionConfig {
        &self.composition
    }

    /// Turn caching on or off.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    /// Search `paths` after the configured include directories.
    pub fn with_search_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include.search_paths.extend(paths);
        self
    }

    /// Replace the configured targets, unless `targets` is empty.
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        if !targets.is_empty() {
            self.composition.targets = targets;
        }
        self
    }
}

/// Cache of compiled units.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    enabled: bool,

    /// Artifact location, `{}` being replaced by the source path.
    #[serde(default = "default_preprocess_format")]
    preprocess_format: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preprocess_format: default_preprocess_format(),
        }
    }
}

impl CacheConfig {
    pub fn new(enabled: bool, preprocess_format: impl Into<String>) -> Self {
        Self {
            enabled,
            preprocess_format: preprocess_format.into(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn preprocess_format(&self) -> &str {
        &self.preprocess_format
    }

    /// Where the artifact of `source` lives.
    ///
    /// ```
    /// # use bdl::config::CacheConfig;
    /// # use std::path::Path;
    /// let cache = CacheConfig::default();
    /// assert_eq!(cache.artifact_path(Path::new("a/b.bdl")), Path::new("a/b.bdl.o"));
    /// ```
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        PathBuf::from(
            self.preprocess_format
                .replace("{}", &source.to_string_lossy()),
        )
    }
}

/// Resolution of `use` directives.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncludeConfig {
    /// Directories tried in order after the including file's directory.
    #[serde(default)]
    search_paths: Vec<PathBuf>,
}

impl IncludeConfig {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

/// Composition stage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositionConfig {
    #[serde(default = "default_targets")]
    targets: Vec<String>,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
        }
    }
}

impl CompositionConfig {
    pub fn new(targets: Vec<String>) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

fn default_true() -> bool {
    true
}

fn default_preprocess_format() -> String {
    DEFAULT_PREPROCESS_FORMAT.to_string()
}

fn default_targets() -> Vec<String> {
    vec![DEFAULT_TARGET.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let config = AppConfig::default()
            .with_cache_enabled(false)
            .with_search_paths([PathBuf::from("lib")])
            .with_targets(vec!["esp32".to_string()]);

        assert!(!config.cache().enabled());
        assert_eq!(config.include().search_paths(), [PathBuf::from("lib")]);
        assert_eq!(config.composition().targets(), ["esp32"]);
    }

    #[test]
    fn test_empty_targets_keep_configuration() {
        let config = AppConfig::default().with_targets(Vec::new());

        assert_eq!(config.composition().targets(), [DEFAULT_TARGET]);
    }

    #[test]
    fn test_custom_artifact_format() {
        let cache = CacheConfig::new(true, "build/{}.json");

        assert_eq!(
            cache.artifact_path(Path::new("unit.bdl")),
            PathBuf::from("build/unit.bdl.json")
        );
    }
}
