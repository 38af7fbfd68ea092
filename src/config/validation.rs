//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, known log levels)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use tracing::Level;

use crate::config::schema::AppConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("system.host must not be empty")]
    EmptyHost,

    #[error("log.level `{0}` is not a known level")]
    UnknownLogLevel(String),

    #[error("log.output_dir must be set when log.file_output is enabled")]
    MissingLogDir,

    #[error("lifecycle.{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.system.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    if config.log.level.parse::<Level>().is_err() {
        errors.push(ValidationError::UnknownLogLevel(config.log.level.clone()));
    }

    if config.log.file_output && config.log.output_dir.trim().is_empty() {
        errors.push(ValidationError::MissingLogDir);
    }

    if config.lifecycle.debounce_ms == 0 {
        errors.push(ValidationError::ZeroDuration("debounce_ms"));
    }
    if config.lifecycle.stop_deadline_secs == 0 {
        errors.push(ValidationError::ZeroDuration("stop_deadline_secs"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
