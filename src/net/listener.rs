//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Report bind failures (address in use, bad host) as [`BindError`]

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::SystemConfig;

/// The listener could not be bound. Fatal for the supervisor.
#[derive(Debug, Error)]
#[error("failed to bind {address}: {source}")]
pub struct BindError {
    /// The `host:port` that was attempted.
    pub address: String,
    #[source]
    pub source: io::Error,
}

impl BindError {
    /// True when another socket already owns the address.
    pub fn is_addr_in_use(&self) -> bool {
        self.source.kind() == io::ErrorKind::AddrInUse
    }
}

/// Bind a TCP listener for the configured host and port.
///
/// Host names are resolved; the first address that binds wins.
pub async fn bind(config: &SystemConfig) -> Result<(TcpListener, SocketAddr), BindError> {
    let address = config.bind_address();

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| BindError {
            address: address.clone(),
            source,
        })?;

    let local_addr = listener.local_addr().map_err(|source| BindError {
        address: address.clone(),
        source,
    })?;

    tracing::info!(address = %local_addr, "Listener bound");

    Ok((listener, local_addr))
}
