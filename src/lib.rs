//! Config-driven restart supervisor for a single HTTP server.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, Supervisor};
