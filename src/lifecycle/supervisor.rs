//! Lifecycle supervisor: owns the serving component and every restart.
//!
//! # Responsibilities
//! - Start the serving component from a configuration snapshot
//! - Consume restart requests one at a time (stop old, then start new)
//! - Own the shutdown sequence once a shutdown request is raised
//!
//! # Design Decisions
//! - The server handle has its own lock; stop+start of a restart happen
//!   under it, so no two instances are ever bound at once
//! - Shutdown wins every tie with a pending restart (biased select)
//! - A failed start raises shutdown instead of leaving the process serverless
//! - A missed stop deadline is logged and the sequence carries on

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::config::{AppConfig, ConfigSource, LifecycleConfig};
use crate::lifecycle::component::{ServerFactory, ServingComponent, ShutdownTimeout};
use crate::lifecycle::debounce::{RestartReceiver, RestartRequest};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::SupervisorState;
use crate::net::BindError;
use crate::observability::metrics;

/// Errors surfaced by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The serving component could not bind. Shutdown has been raised.
    #[error(transparent)]
    Start(#[from] BindError),

    /// `start` was called while an instance is already serving.
    #[error("a server instance is already running")]
    AlreadyRunning,

    /// The supervisor shut itself down after a fatal start failure.
    #[error("supervisor stopped after a fatal start failure")]
    FatalShutdown,
}

/// Timing knobs for restart and shutdown.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Graceful stop deadline for every stop.
    pub stop_deadline: Duration,
    /// Pause between stopping the old instance and starting the new one.
    pub rebind_delay: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for SupervisorOptions {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            stop_deadline: config.stop_deadline(),
            rebind_delay: config.rebind_delay(),
        }
    }
}

/// Keeps exactly one serving component alive across configuration changes.
pub struct Supervisor<F: ServerFactory> {
    factory: F,
    source: Arc<dyn ConfigSource>,
    /// The server handle. `None` while nothing is serving.
    handle: Mutex<Option<F::Server>>,
    restarts: Mutex<RestartReceiver>,
    shutdown: Shutdown,
    state: watch::Sender<SupervisorState>,
    options: SupervisorOptions,
    fatal: AtomicBool,
    restart_count: AtomicU64,
}

impl<F: ServerFactory> Supervisor<F> {
    pub fn new(
        factory: F,
        source: Arc<dyn ConfigSource>,
        restarts: RestartReceiver,
        shutdown: Shutdown,
        options: SupervisorOptions,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Starting);
        Self {
            factory,
            source,
            handle: Mutex::new(None),
            restarts: Mutex::new(restarts),
            shutdown,
            state,
            options,
            fatal: AtomicBool::new(false),
            restart_count: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Number of completed restart sequences.
    pub fn restart_count(&self) -> u64 {
        self.restart_count.load(Ordering::SeqCst)
    }

    /// Address of the serving instance, if one is up.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.lock().await.as_ref().and_then(|s| s.local_addr())
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Build and start a server from `config`.
    ///
    /// A bind failure is fatal: shutdown is raised and the error returned.
    pub async fn start(&self, config: Arc<AppConfig>) -> Result<(), SupervisorError> {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return Err(SupervisorError::AlreadyRunning);
        }
        self.start_locked(&mut handle, config).await
    }

    /// Stop the current server within `deadline`.
    ///
    /// The handle is always cleared, even when the deadline is missed.
    pub async fn stop(&self, deadline: Duration) -> Result<(), ShutdownTimeout> {
        let mut handle = self.handle.lock().await;
        self.stop_locked(&mut handle, deadline).await
    }

    /// Stop the current server and start a new one from `config`, atomically.
    pub async fn restart(&self, config: Arc<AppConfig>) -> Result<(), SupervisorError> {
        let mut handle = self.handle.lock().await;

        // Shutdown may have been raised while we waited for the lock.
        if self.shutdown.is_triggered() {
            tracing::info!("Shutdown requested, skipping restart");
            return Ok(());
        }

        self.set_state(SupervisorState::Restarting);
        tracing::info!(address = %config.system.bind_address(), "Restarting server");

        // A missed deadline is already logged; the restart proceeds.
        let _ = self.stop_locked(&mut handle, self.options.stop_deadline).await;

        if !self.options.rebind_delay.is_zero() {
            let mut shutdown = self.shutdown.subscribe();
            tokio::select! {
                _ = tokio::time::sleep(self.options.rebind_delay) => {}
                _ = shutdown.recv() => {}
            }
        }

        // The old instance is gone; do not bind a new one after termination
        // was requested during the drain or the rebind delay.
        if self.shutdown.is_triggered() {
            tracing::info!("Shutdown requested during restart, not starting a new server");
            return Ok(());
        }

        match self.start_locked(&mut handle, config).await {
            Ok(()) => {
                let count = self.restart_count.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::record_restart("success");
                tracing::info!(restarts = count, "Server restart complete");
                Ok(())
            }
            Err(e) => {
                metrics::record_restart("failed");
                Err(e)
            }
        }
    }

    /// Main loop. Returns once a shutdown request has been serviced.
    pub async fn run(&self) -> Result<(), SupervisorError> {
        let mut restarts = self.restarts.lock().await;
        let mut shutdown = self.shutdown.subscribe();

        tracing::info!("Supervisor running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,

                request = restarts.recv() => match request {
                    Some(RestartRequest) => {
                        if self.shutdown.is_triggered() {
                            break;
                        }
                        self.set_state(SupervisorState::RestartPending);
                        let config = self.source.snapshot();
                        if let Err(e) = self.restart(config).await {
                            tracing::error!(error = %e, "Restart failed");
                        }
                    }
                    None => {
                        tracing::debug!("Restart slot closed, waiting for shutdown");
                        shutdown.recv().await;
                        break;
                    }
                },
            }
        }

        self.set_state(SupervisorState::ShuttingDown);
        tracing::info!("Shutdown requested, stopping server");

        // Recovered locally: the timeout has been logged and the handle cleared.
        let _ = self.stop(self.options.stop_deadline).await;

        self.set_state(SupervisorState::Stopped);
        tracing::info!(restarts = self.restart_count(), "Supervisor stopped");

        if self.fatal.load(Ordering::SeqCst) {
            Err(SupervisorError::FatalShutdown)
        } else {
            Ok(())
        }
    }

    async fn start_locked(
        &self,
        handle: &mut Option<F::Server>,
        config: Arc<AppConfig>,
    ) -> Result<(), SupervisorError> {
        let name = config.system.name.clone();
        let mut server = self.factory.build(config);

        match server.start().await {
            Ok(()) => {
                tracing::info!(
                    name = %name,
                    address = ?server.local_addr(),
                    "Server started"
                );
                *handle = Some(server);
                metrics::set_server_up(true);
                self.set_state(SupervisorState::Running);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Server failed to start, shutting down");
                self.fatal.store(true, Ordering::SeqCst);
                self.shutdown.trigger();
                Err(e.into())
            }
        }
    }

    async fn stop_locked(
        &self,
        handle: &mut Option<F::Server>,
        deadline: Duration,
    ) -> Result<(), ShutdownTimeout> {
        let Some(mut server) = handle.take() else {
            return Ok(());
        };

        tracing::info!(deadline = ?deadline, "Stopping server");
        let result = server.stop(deadline).await;
        metrics::set_server_up(false);

        match &result {
            Ok(()) => tracing::info!("Server stopped gracefully"),
            Err(timeout) => {
                metrics::record_shutdown_timeout();
                tracing::warn!(error = %timeout, "Server stop timed out, forced close");
            }
        }
        result
    }

    fn set_state(&self, next: SupervisorState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Supervisor state changed");
        }
    }
}
