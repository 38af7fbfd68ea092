//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! SystemConfig (host, port)
//!     → listener.rs (bind, BindError on failure)
//!     → Hand off to HTTP layer (axum accept loop)
//!     → connection.rs (open connection and in-flight request counts)
//! ```
//!
//! # Design Decisions
//! - Bind errors carry the attempted address for operator logs
//! - Connections and requests are counted so a stop can report what it cut off

pub mod connection;
pub mod listener;

pub use connection::ConnectionTracker;
pub use listener::{bind, BindError};
