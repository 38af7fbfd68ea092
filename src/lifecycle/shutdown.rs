//! Shutdown coordination.

use std::sync::Arc;

use tokio::sync::watch;

/// One-shot shutdown request shared by every long-running task.
///
/// Once triggered it stays triggered; listeners that subscribe afterwards
/// observe it immediately.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Raise the shutdown request.
    ///
    /// Returns `true` only for the call that actually raised it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|raised| {
            if *raised {
                false
            } else {
                *raised = true;
                true
            }
        })
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Wait until shutdown has been requested.
    pub async fn recv(&mut self) {
        // The sender cannot drop while a `Shutdown` handle exists; if every
        // handle is gone nobody can raise it anymore, so treat that as final.
        let _ = self.rx.wait_for(|raised| *raised).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}
