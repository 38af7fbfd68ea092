//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::load_config;
use crate::config::source::{ConfigSource, SharedConfig};

/// A watcher that monitors the configuration file for changes.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save through a rename keep being observed. Events are
/// handled one at a time: the reload delay holds back every event behind it.
pub struct ConfigWatcher {
    path: PathBuf,
    target: Arc<SharedConfig>,
    reload_delay: Duration,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher feeding `target`.
    pub fn new(path: &Path, target: Arc<SharedConfig>, reload_delay: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            target,
            reload_delay,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive; dropping it stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let file_name = path.file_name().map(|n| n.to_os_string());
        let target = self.target;
        let reload_delay = self.reload_delay;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!(path = ?path, kind = ?event.kind, "Config file change detected");
                        // Let the writer finish before parsing. This runs on
                        // notify's event thread, so later events queue behind it.
                        std::thread::sleep(reload_delay);
                        reload(&path, &target);
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Re-read `path` into `target`, keeping the current snapshot on failure.
///
/// Returns whether a new snapshot was installed. Unchanged content is not
/// treated as a change.
pub fn reload(path: &Path, target: &SharedConfig) -> bool {
    match load_config(path) {
        Ok(new_config) => {
            if *target.snapshot() == new_config {
                tracing::debug!(path = ?path, "Config content unchanged, ignoring event");
                return false;
            }
            tracing::info!(
                name = %new_config.system.name,
                address = %new_config.system.bind_address(),
                "Config reloaded"
            );
            target.replace(new_config);
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AppConfig;
    use std::fs;

    #[test]
    fn reload_installs_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[system]\nport = 7001\n").unwrap();

        let target = SharedConfig::new(AppConfig::default());
        assert!(reload(&path, &target));
        assert_eq!(target.snapshot().system.port, 7001);

        // Same content again is not a change.
        assert!(!reload(&path, &target));
    }

    #[test]
    fn reload_keeps_current_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[system\nport = ").unwrap();

        let target = SharedConfig::new(AppConfig::default());
        assert!(!reload(&path, &target));
        assert_eq!(*target.snapshot(), AppConfig::default());
    }
}
