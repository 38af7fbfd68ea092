//! Restart debouncing.
//!
//! Collapses bursts of configuration change notifications into a single
//! pending restart request.
//!
//! ```text
//! on_change ─▶ DebounceGuard ──admitted──▶ restart slot (capacity 1) ─▶ Supervisor
//!                    │                           │
//!                 rejected                   already full
//!                    ▼                           ▼
//!                 (logged)                    (no-op)
//! ```
//!
//! Never blocks: callable from the watcher's notification thread.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::ChangeCallback;
use crate::observability::metrics;

/// "A restart is due." Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequest;

pub type RestartSender = mpsc::Sender<RestartRequest>;
pub type RestartReceiver = mpsc::Receiver<RestartRequest>;

/// Create the capacity-1 slot holding at most one pending restart.
pub fn restart_slot() -> (RestartSender, RestartReceiver) {
    mpsc::channel(1)
}

/// Outcome of a single change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A new restart request was enqueued.
    Scheduled,
    /// Admitted, but a request was already waiting in the slot.
    AlreadyPending,
    /// Too soon after the last accepted restart.
    Rejected,
    /// The supervisor is gone; nothing will consume the request.
    Closed,
}

/// Timestamp of the last accepted restart, behind its own lock.
#[derive(Debug)]
pub struct DebounceGuard {
    window: Duration,
    last_restart: Mutex<Option<Instant>>,
}

impl DebounceGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_restart: Mutex::new(None),
        }
    }

    /// Admit a restart at `now` unless one was accepted within the window.
    pub fn try_admit(&self, now: Instant) -> bool {
        let mut last = match self.last_restart.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(previous) = *last {
            if now.saturating_duration_since(previous) < self.window {
                return false;
            }
        }

        *last = Some(now);
        true
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Turns change notifications into at most one outstanding restart request.
#[derive(Debug)]
pub struct Debouncer {
    guard: DebounceGuard,
    slot: RestartSender,
}

impl Debouncer {
    pub fn new(window: Duration, slot: RestartSender) -> Self {
        Self {
            guard: DebounceGuard::new(window),
            slot,
        }
    }

    /// Handle a change notification observed now.
    pub fn on_change(&self) -> Decision {
        self.on_change_at(Instant::now())
    }

    /// Handle a change notification observed at `now`.
    pub fn on_change_at(&self, now: Instant) -> Decision {
        if !self.guard.try_admit(now) {
            tracing::debug!(
                window_ms = self.guard.window().as_millis() as u64,
                "Restart requested too soon after the previous one, skipping"
            );
            metrics::record_debounce_rejected();
            return Decision::Rejected;
        }

        // The guard lock is released here; enqueueing never waits on it.
        match self.slot.try_send(RestartRequest) {
            Ok(()) => {
                tracing::info!("Configuration changed, restart scheduled");
                Decision::Scheduled
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Restart already pending, skipping");
                Decision::AlreadyPending
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Supervisor no longer accepts restarts");
                Decision::Closed
            }
        }
    }

    /// Adapter for [`ConfigSource::subscribe`](crate::config::ConfigSource::subscribe).
    pub fn callback(self: &Arc<Self>) -> ChangeCallback {
        let debouncer = Arc::clone(self);
        Arc::new(move || {
            debouncer.on_change();
        })
    }
}
