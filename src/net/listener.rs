//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Report the bound address (port 0 resolves to an ephemeral port)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Any other failure reported by an application while starting to listen.
    #[error("Failed to start listening: {0}")]
    Other(String),
}

/// Bind a TCP listener on `address`.
pub async fn bind(address: SocketAddr) -> Result<TcpListener, ListenError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| ListenError::Bind { address, source })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ListenError::Bind { address, source })?;

    tracing::debug!(address = %local_addr, "Listener bound");

    Ok(listener)
}
