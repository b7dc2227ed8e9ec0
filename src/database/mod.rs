//! Database connectivity subsystem.
//!
//! # Data Flow
//! ```text
//! DatabaseSettings (url, connect timeout)
//!     → probe.rs (resolve host:port, connect once)
//!     → Ok(()) lets startup proceed to listening
//! ```
//!
//! # Design Decisions
//! - One attempt only: retries belong to the process supervisor
//! - Pooling and queries are the connector's own concern, not the lifecycle's

pub mod probe;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use probe::{resolve_address, TcpProbeConnector};

/// Error type for database connectivity.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("invalid database url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("database at {address} is unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database at {address} did not answer within {timeout:?}")]
    Timeout { address: String, timeout: Duration },
}

/// Establishes database connectivity before the server accepts traffic.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Connect once. Any error is a startup failure.
    async fn connect(&self) -> Result<(), DatabaseError>;
}
