//! HTTP serving component.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, in-flight tracking)
//!     → handlers.rs (/health, /config)
//!     → Send to client
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer, HttpServerFactory};
