//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → source.rs (atomic swap of Arc<AppConfig>)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → SharedConfig::replace swaps the snapshot
//!     → subscribers (the restart debouncer) are notified
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A failed reload keeps the previous snapshot

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, resolve_config_path, ConfigError};
pub use schema::{AppConfig, HttpConfig, LifecycleConfig, LogConfig, LogFormat, ObservabilityConfig, SystemConfig};
pub use source::{ChangeCallback, ConfigSource, SharedConfig};
pub use watcher::ConfigWatcher;
