//! Connection and request lifecycle tracking.
//!
//! # Responsibilities
//! - Count open connections and in-flight requests of one server instance
//! - Generate unique connection IDs for tracing
//! - Report what a forced close cut off

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks open connections and in-flight requests.
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    connections: Arc<AtomicU64>,
    requests: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly accepted connection. Returns a guard that decrements on drop.
    pub fn track_connection(&self) -> ConnectionGuard {
        self.connections.fetch_add(1, Ordering::SeqCst);
        let id = ConnectionId::new();
        tracing::trace!(connection_id = %id, "Connection opened");
        ConnectionGuard {
            connections: Arc::clone(&self.connections),
            id,
        }
    }

    /// Record a request entering the handler stack.
    pub fn track_request(&self) -> RequestGuard {
        self.requests.fetch_add(1, Ordering::SeqCst);
        RequestGuard {
            requests: Arc::clone(&self.requests),
        }
    }

    pub fn active_connections(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn active_requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the open connection count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    connections: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Guard that tracks a request's lifetime.
#[derive(Debug)]
pub struct RequestGuard {
    requests: Arc<AtomicU64>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.requests.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn tracker_counts_connections_and_requests() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_connections(), 0);
        assert_eq!(tracker.active_requests(), 0);

        let conn1 = tracker.track_connection();
        let conn2 = tracker.clone().track_connection();
        assert_ne!(conn1.id(), conn2.id());
        let request = tracker.track_request();
        assert_eq!(tracker.active_connections(), 2);
        assert_eq!(tracker.active_requests(), 1);

        drop(request);
        drop(conn1);
        assert_eq!(tracker.active_connections(), 1);
        assert_eq!(tracker.active_requests(), 0);

        drop(conn2);
        assert_eq!(tracker.active_connections(), 0);
    }
}
