//! The serving component contract driven by the supervisor.
//!
//! # States
//! ```text
//! built → start() → serving → stop(deadline) → stopped
//! ```
//!
//! # Design Decisions
//! - `start` returns once the listener is bound, not when serving ends
//! - `stop` is called at most once per successful `start`
//! - A missed deadline is reported, never panics

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::AppConfig;
use crate::net::BindError;

/// The server did not drain before its deadline and was force-closed.
///
/// Recovered locally: the stop still completes and the handle is cleared.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error(
    "server did not drain within {deadline:?}; {connections} connection(s) and {in_flight} in-flight request(s) force-closed"
)]
pub struct ShutdownTimeout {
    pub deadline: Duration,
    /// Connections still open when the deadline passed.
    pub connections: u64,
    /// Requests still inside a handler when the deadline passed.
    pub in_flight: u64,
}

/// One instance of the network-serving component.
pub trait ServingComponent: Send + 'static {
    /// Bind and begin serving in the background.
    fn start(&mut self) -> impl Future<Output = Result<(), BindError>> + Send;

    /// Stop accepting, drain up to `deadline`, then force-close.
    fn stop(&mut self, deadline: Duration) -> impl Future<Output = Result<(), ShutdownTimeout>> + Send;

    /// Address the instance is bound to, while serving.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Builds a fresh [`ServingComponent`] from a configuration snapshot.
pub trait ServerFactory: Send + Sync + 'static {
    type Server: ServingComponent;

    fn build(&self, config: Arc<AppConfig>) -> Self::Server;
}
