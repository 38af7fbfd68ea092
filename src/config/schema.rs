//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! supervised server. All types derive Serde traits for deserialization from
//! config files and serialization through the `/config` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Identity and bind address of the served application.
    pub system: SystemConfig,

    /// Log output settings.
    pub log: LogConfig,

    /// Restart and shutdown timing.
    pub lifecycle: LifecycleConfig,

    /// Per-request HTTP settings.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Application identity and listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SystemConfig {
    /// Application name reported by `/health`.
    pub name: String,

    /// Host or IP to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind. 0 asks the OS for an ephemeral port.
    pub port: u16,
}

impl SystemConfig {
    /// The `host:port` pair handed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "relaunch".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Directory for the rolling log files.
    pub output_dir: String,

    /// Write to stdout.
    pub console_output: bool,

    /// Write every event to a daily `app.<date>.log` in `output_dir`.
    pub file_output: bool,

    /// Also write each level to its own daily file (`info.<date>.log`, ...).
    /// Only applies with `file_output`.
    pub level_files: bool,

    /// Rotated files kept per log besides the current one; older ones are deleted.
    pub max_backups: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            output_dir: "logs".to_string(),
            console_output: true,
            file_output: false,
            level_files: true,
            max_backups: 7,
        }
    }
}

/// Restart and shutdown timing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Minimum interval between two accepted restarts, in milliseconds.
    pub debounce_ms: u64,

    /// Graceful stop deadline, in seconds.
    pub stop_deadline_secs: u64,

    /// Pause between stopping the old server and binding the new one.
    pub rebind_delay_ms: u64,

    /// Pause after a file event before re-reading the file.
    pub reload_delay_ms: u64,
}

impl LifecycleConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stop_deadline(&self) -> Duration {
        Duration::from_secs(self.stop_deadline_secs)
    }

    pub fn rebind_delay(&self) -> Duration {
        Duration::from_millis(self.rebind_delay_ms)
    }

    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            stop_deadline_secs: 5,
            rebind_delay_ms: 500,
            reload_delay_ms: 100,
        }
    }
}

/// HTTP request handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
