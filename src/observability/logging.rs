//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber from `[log]` settings
//! - Console and/or rolling file output, text or JSON
//! - Optional per-level files next to the combined `app` log
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` overrides the configured level
//! - File output goes through non-blocking writers; keep the guard alive
//! - Files rotate daily and only `max_backups + 1` files per log are kept

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::{filter_fn, ParseError};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogConfig, LogFormat};

/// Prefix of the combined log file inside `output_dir`.
pub const LOG_FILE_PREFIX: &str = "app";

const LOG_FILE_SUFFIX: &str = "log";

/// Levels that get their own file when `level_files` is on.
const LEVEL_FILES: [(Level, &str); 5] = [
    (Level::TRACE, "trace"),
    (Level::DEBUG, "debug"),
    (Level::INFO, "info"),
    (Level::WARN, "warn"),
    (Level::ERROR, "error"),
];

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),

    #[error("invalid log level: {0}")]
    Filter(#[from] ParseError),

    #[error("logging already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writers.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize logging system.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(&config.level)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console_output {
        layers.push(fmt_layer(config.format, io::stdout, true));
    }

    let (files, file_guards) = file_layers(config)?;
    layers.extend(files);

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        file_output = config.file_output,
        level_files = config.level_files,
        max_backups = config.max_backups,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guards: file_guards,
    })
}

/// Env filter from `RUST_LOG`, falling back to the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level),
    }
}

/// File layers for `config`: the combined log plus one per level.
///
/// Empty when `file_output` is off.
fn file_layers(config: &LogConfig) -> Result<(Vec<BoxedLayer>, Vec<WorkerGuard>), LoggingError> {
    let mut layers = Vec::new();
    let mut guards = Vec::new();

    if !config.file_output {
        return Ok((layers, guards));
    }

    let dir = PathBuf::from(&config.output_dir);
    fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let appender = rolling_appender(&dir, LOG_FILE_PREFIX, config.max_backups)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    layers.push(fmt_layer(config.format, writer, false));
    guards.push(guard);

    if config.level_files {
        for (level, prefix) in LEVEL_FILES {
            let appender = rolling_appender(&dir, prefix, config.max_backups)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt_layer(config.format, writer, false)
                .with_filter(filter_fn(move |meta| *meta.level() == level))
                .boxed();
            layers.push(layer);
            guards.push(guard);
        }
    }

    Ok((layers, guards))
}

fn rolling_appender(dir: &Path, prefix: &str, max_backups: usize) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(max_backups.saturating_add(1))
        .build(dir)
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config(dir: &Path) -> LogConfig {
        LogConfig {
            level: "trace".into(),
            output_dir: dir.display().to_string(),
            console_output: false,
            file_output: true,
            ..LogConfig::default()
        }
    }

    /// Contents of the single file in `dir` whose name starts with `prefix.`.
    fn read_log(dir: &Path, prefix: &str) -> String {
        let start = format!("{prefix}.");
        let mut matches: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&start))
            })
            .collect();
        assert_eq!(matches.len(), 1, "expected one {prefix} log in {dir:?}");
        fs::read_to_string(matches.remove(0)).unwrap()
    }

    #[test]
    fn filter_accepts_configured_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(build_filter(level).is_ok(), "{level}");
        }
    }

    #[test]
    fn text_and_json_layers_build() {
        let _text = fmt_layer(LogFormat::Text, io::sink, false);
        let _json = fmt_layer(LogFormat::Json, io::sink, false);
    }

    #[test]
    fn no_file_layers_without_file_output() {
        let config = LogConfig {
            file_output: false,
            ..LogConfig::default()
        };
        let (layers, guards) = file_layers(&config).unwrap();
        assert!(layers.is_empty());
        assert!(guards.is_empty());
    }

    #[test]
    fn level_files_receive_only_their_level() {
        let dir = tempfile::tempdir().unwrap();
        let (layers, guards) = file_layers(&file_config(dir.path())).unwrap();
        assert_eq!(layers.len(), 1 + LEVEL_FILES.len());

        let subscriber = tracing_subscriber::registry().with(layers);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("served a request");
            tracing::error!("bind failed");
        });
        // Flush the non-blocking writers.
        drop(guards);

        let combined = read_log(dir.path(), "app");
        assert!(combined.contains("served a request"));
        assert!(combined.contains("bind failed"));

        let errors = read_log(dir.path(), "error");
        assert!(errors.contains("bind failed"));
        assert!(!errors.contains("served a request"));

        let infos = read_log(dir.path(), "info");
        assert!(infos.contains("served a request"));
        assert!(!infos.contains("bind failed"));
    }

    #[test]
    fn level_files_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            level_files: false,
            ..file_config(dir.path())
        };
        let (layers, _guards) = file_layers(&config).unwrap();
        assert_eq!(layers.len(), 1);
        assert!(read_log(dir.path(), "app").is_empty());
    }
}
