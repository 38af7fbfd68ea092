//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT; Ctrl-C elsewhere)
//! - Translate the first signal into a single shutdown request
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered up front so a registration failure is a
//!   startup error, not a silent loss of graceful shutdown
//! - After the first signal the listener exits; repeats are ignored rather
//!   than queued, so teardown is never re-entered
//! - The listener only raises the request; the stop sequence is the
//!   supervisor's

use std::future::Future;
use std::io;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Registered termination signal streams.
#[cfg(unix)]
pub struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Register for SIGINT and SIGTERM. Must run inside a Tokio runtime.
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next termination signal and name it.
    pub async fn recv(&mut self) -> io::Result<&'static str> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Ok("SIGINT"),
            Some(()) = self.terminate.recv() => Ok("SIGTERM"),
            else => Err(io::Error::new(io::ErrorKind::BrokenPipe, "signal streams closed")),
        }
    }
}

/// Registered termination signal streams.
#[cfg(not(unix))]
pub struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    pub fn register() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> io::Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}

/// Turns the first termination signal into a shutdown request.
pub struct SignalListener {
    shutdown: Shutdown,
    signals: OsSignals,
}

impl SignalListener {
    /// Register OS signal handlers feeding `shutdown`.
    pub fn install(shutdown: Shutdown) -> io::Result<Self> {
        let signals = OsSignals::register()?;
        tracing::debug!("Termination signal handlers installed");
        Ok(Self { shutdown, signals })
    }

    /// Listen until a signal arrives or shutdown is raised elsewhere.
    pub async fn run(mut self) -> io::Result<()> {
        listen(&self.shutdown, self.signals.recv()).await
    }

    /// Run the listener on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!(error = %e, "Signal listener failed");
            }
        })
    }
}

/// Raise `shutdown` once `signal` fires.
///
/// Returns early, without raising anything, if shutdown was already raised
/// by another path.
pub async fn listen<S>(shutdown: &Shutdown, signal: S) -> io::Result<()>
where
    S: Future<Output = io::Result<&'static str>>,
{
    let mut raised = shutdown.subscribe();

    tokio::select! {
        received = signal => {
            let name = received?;
            if shutdown.trigger() {
                tracing::info!(signal = name, "Termination signal received, shutting down");
            } else {
                tracing::info!(signal = name, "Shutdown already in progress, ignoring signal");
            }
        }
        _ = raised.recv() => {
            tracing::debug!("Shutdown raised elsewhere, signal listener exiting");
        }
    }

    Ok(())
}
