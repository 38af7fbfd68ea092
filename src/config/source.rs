//! The configuration source consumed by the supervisor.
//!
//! A source hands out immutable snapshots and tells subscribers when a new
//! one is available. Subscribers only learn *that* something changed; they
//! fetch the snapshot themselves when they are ready to use it.

use std::sync::{Arc, RwLock};

use arc_swap::ArcSwap;

use crate::config::schema::AppConfig;

/// Callback fired once per accepted configuration change.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Supplies configuration snapshots and change notifications.
pub trait ConfigSource: Send + Sync {
    /// The current snapshot. Never blocks on I/O.
    fn snapshot(&self) -> Arc<AppConfig>;

    /// Register a callback for future changes.
    fn subscribe(&self, on_change: ChangeCallback);
}

/// In-memory configuration source backed by an atomic pointer swap.
///
/// The file watcher feeds it; tests drive it directly through [`replace`].
///
/// [`replace`]: SharedConfig::replace
pub struct SharedConfig {
    current: ArcSwap<AppConfig>,
    subscribers: RwLock<Vec<ChangeCallback>>,
}

impl SharedConfig {
    pub fn new(config: AppConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Install a new snapshot and notify every subscriber.
    pub fn replace(&self, config: AppConfig) {
        self.current.store(Arc::new(config));
        self.notify();
    }

    /// Fire all subscribers without changing the snapshot.
    pub fn notify(&self) {
        // Clone the list so callbacks may subscribe without deadlocking.
        let subscribers = match self.subscribers.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for callback in subscribers {
            callback();
        }
    }

}

impl ConfigSource for SharedConfig {
    fn snapshot(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    fn subscribe(&self, on_change: ChangeCallback) {
        match self.subscribers.write() {
            Ok(mut guard) => guard.push(on_change),
            Err(poisoned) => poisoned.into_inner().push(on_change),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn replace_swaps_snapshot_and_notifies() {
        let source = SharedConfig::new(AppConfig::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        source.subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let before = source.snapshot();
        let mut next = AppConfig::default();
        next.system.port = 9999;
        source.replace(next);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(source.snapshot().system.port, 9999);
        // Snapshots already handed out are never mutated.
        assert_eq!(before.system.port, 8080);
    }

    #[test]
    fn callbacks_may_subscribe_reentrantly() {
        let source = Arc::new(SharedConfig::new(AppConfig::default()));
        let late_fired = Arc::new(AtomicUsize::new(0));
        let inner = source.clone();
        let counter = late_fired.clone();
        source.subscribe(Arc::new(move || {
            let counter = counter.clone();
            inner.subscribe(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        // The first round registers the late callback without running it.
        source.notify();
        assert_eq!(late_fired.load(Ordering::SeqCst), 0);

        source.notify();
        assert_eq!(late_fired.load(Ordering::SeqCst), 1);
    }
}
