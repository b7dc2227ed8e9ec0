//! Startup orchestration.
//!
//! # Responsibilities
//! - Establish database connectivity
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is retried
//! - Listeners start last (traffic only when the database is reachable)

use std::net::SocketAddr;

use thiserror::Error;

use crate::database::{DatabaseConnector, DatabaseError};
use crate::http::Application;
use crate::net::ListenError;

/// Error type for startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[source] DatabaseError),

    #[error("listener failed to start: {0}")]
    Listen(#[source] ListenError),
}

/// Connect the database, then start listening on `addr`.
pub async fn start<D, A>(database: &D, app: &A, addr: SocketAddr) -> Result<A::Handle, StartupError>
where
    D: DatabaseConnector + ?Sized,
    A: Application,
{
    database.connect().await.map_err(StartupError::Database)?;

    app.listen(addr).await.map_err(StartupError::Listen)
}
