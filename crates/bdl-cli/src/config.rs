//! Configuration file loading for the CLI
//!
//! This module handles finding and loading TOML configuration files
//! from various locations (explicit path, local directory, system directory).

use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use bdl::{BdlError, config::AppConfig};

/// Configuration-related errors for CLI
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(String),

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for BdlError {
    fn from(err: ConfigError) -> Self {
        BdlError::Config(err.to_string())
    }
}

/// Find and load configuration from various locations
///
/// Search order:
/// 1. Explicit path if provided
/// 2. Local project directory (bdl/config.toml)
/// 3. Platform-specific config directory
/// 4. Default config if none found
///
/// # Errors
///
/// Returns error if:
/// - Explicit path is provided but file doesn't exist
/// - Config file exists but cannot be parsed or is invalid
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, BdlError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        return load_config_file(path);
    }

    let local_config = Path::new("bdl/config.toml");
    if local_config.exists() {
        info!(path = local_config.display().to_string(); "Loading configuration from local path");
        return load_config_file(local_config);
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "bdl", "bdl") {
        let system_config = proj_dirs.config_dir().join("config.toml");

        if system_config.exists() {
            info!(
                path = system_config.display().to_string();
                "Loading configuration from system path"
            );
            return load_config_file(system_config);
        }

        debug!(path = system_config.display().to_string(); "System configuration file not found");
    } else {
        debug!("Could not determine platform-specific config directory");
    }

    debug!("No configuration file found, using default configuration");
    Ok(AppConfig::default())
}

fn load_config_file(path: impl AsRef<Path>) -> Result<AppConfig, BdlError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path).map_err(|source| BdlError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    if config.composition().targets().is_empty() {
        return Err(ConfigError::Validation(
            "composition.targets must not be empty".to_string(),
        )
        .into());
    }
    if config.cache().enabled() && !config.cache().preprocess_format().contains("{}") {
        return Err(ConfigError::Validation(
            "cache.preprocess_format must contain '{}'".to_string(),
        )
        .into());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[cache]\nenabled = false\n\n[composition]\ntargets = [\"linux\"]\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert!(!config.cache().enabled());
        assert_eq!(config.composition().targets(), ["linux"]);
        assert!(config.include().search_paths().is_empty());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = load_config(Some("does/not/exist.toml")).unwrap_err();

        assert!(matches!(err, BdlError::Config(message) if message.contains("exist.toml")));
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[composition]\ntargets = []\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, BdlError::Config(message) if message.contains("targets")));

        fs::write(&path, "[cache\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, BdlError::Config(message) if message.starts_with("Failed to parse")));
    }
}
