//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Locations searched, in order, when no explicit path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["config.toml", "config/config.toml"];

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("no configuration file found (searched {})", .0.join(", "))]
    NotFound(Vec<String>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Pick the configuration file to load.
///
/// An explicit path is used as-is. Otherwise the first existing entry of
/// [`DEFAULT_CONFIG_PATHS`] relative to `base` wins.
pub fn resolve_config_path(explicit: Option<&Path>, base: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS
        .iter()
        .map(|candidate| base.join(candidate))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            ConfigError::NotFound(DEFAULT_CONFIG_PATHS.iter().map(|p| p.to_string()).collect())
        })
}
