//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics, the configuration source and its watcher
//! - Wire the restart debouncer between source and supervisor
//! - Register signal handlers and bind the first server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)
//! - Lifecycle timings are read once at startup; a reload changes the
//!   served application, not the supervisor's own knobs

use std::net::AddrParseError;
use std::path::Path;
use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;

use crate::config::{AppConfig, ConfigSource, ConfigWatcher, SharedConfig};
use crate::http::HttpServerFactory;
use crate::lifecycle::debounce::{restart_slot, Debouncer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::SignalListener;
use crate::lifecycle::supervisor::{Supervisor, SupervisorError, SupervisorOptions};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to watch configuration file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),

    #[error("failed to start server: {0}")]
    Start(#[from] SupervisorError),
}

/// A started application: server bound, watcher and signal handlers armed.
pub struct App {
    supervisor: Arc<Supervisor<HttpServerFactory>>,
    source: Arc<SharedConfig>,
    signals: Option<SignalListener>,
    _watcher: Option<RecommendedWatcher>,
}

/// Bring the application up from a loaded configuration.
///
/// With `config_path` set the file is watched and every accepted change
/// schedules a restart.
pub async fn launch(config: AppConfig, config_path: Option<&Path>) -> Result<App, StartupError> {
    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let lifecycle = config.lifecycle.clone();
    let source = Arc::new(SharedConfig::new(config));
    let shutdown = Shutdown::new();

    let (restart_tx, restart_rx) = restart_slot();
    let debouncer = Arc::new(Debouncer::new(lifecycle.debounce_window(), restart_tx));
    source.subscribe(debouncer.callback());

    let watcher = match config_path {
        Some(path) => {
            let watcher = ConfigWatcher::new(path, Arc::clone(&source), lifecycle.reload_delay());
            Some(watcher.run()?)
        }
        None => None,
    };

    let signals = SignalListener::install(shutdown.clone())?;

    let dyn_source: Arc<dyn ConfigSource> = source.clone();
    let supervisor = Arc::new(Supervisor::new(
        HttpServerFactory,
        dyn_source,
        restart_rx,
        shutdown,
        SupervisorOptions::from(&lifecycle),
    ));

    supervisor.start(source.snapshot()).await?;

    Ok(App {
        supervisor,
        source,
        signals: Some(signals),
        _watcher: watcher,
    })
}

impl App {
    pub fn supervisor(&self) -> &Arc<Supervisor<HttpServerFactory>> {
        &self.supervisor
    }

    /// The configuration source feeding the supervisor.
    pub fn config(&self) -> &Arc<SharedConfig> {
        &self.source
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.supervisor.shutdown_handle()
    }

    /// Run until shutdown. Errors only when the supervisor shut itself down.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let signal_task = self.signals.take().map(SignalListener::spawn);

        let result = self.supervisor.run().await;

        if let Some(task) = signal_task {
            task.abort();
        }
        result
    }
}
