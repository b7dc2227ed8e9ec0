//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Application::listen(addr)
//!     → server.rs (bind, Axum setup, serve task with graceful shutdown)
//!     → request.rs (request ID added, propagated to response)
//!     → health.rs (liveness + draining state)
//!
//! ListeningHandle::close()
//!     → stop accepting → in-flight requests finish → serve task ends
//! ```

pub mod health;
pub mod request;
pub mod server;

use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

use crate::net::ListenError;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{HttpApp, HttpHandle};

/// Error reported while closing a listening handle.
#[derive(Debug, Error)]
pub enum CloseError {
    /// The server loop returned an I/O error.
    #[error("server error during close: {0}")]
    Serve(#[from] std::io::Error),

    /// The serve task panicked or was cancelled.
    #[error("server task ended abnormally: {0}")]
    Task(String),
}

/// An application that can start accepting traffic.
#[async_trait]
pub trait Application: Send + Sync {
    /// Handle returned once listening.
    type Handle: ListeningHandle;

    /// Bind `addr` and start serving.
    async fn listen(&self, addr: SocketAddr) -> Result<Self::Handle, ListenError>;
}

/// A live listening socket. Closing consumes it, so it closes at most once.
#[async_trait]
pub trait ListeningHandle: Send + 'static {
    /// The address actually bound.
    fn local_addr(&self) -> SocketAddr;

    /// Stop accepting, finish in-flight requests, resolve once drained.
    async fn close(self) -> Result<(), CloseError>;
}
