//! Server process bootstrap with graceful shutdown.
//!
//! # Architecture Overview
//!
//! ```text
//!   config ──▶ lifecycle::controller
//!                 │
//!                 ├─ 1. database::DatabaseConnector::connect
//!                 ├─ 2. http::Application::listen ──▶ ListeningHandle
//!                 ├─ 3. lifecycle::signals (SIGTERM/SIGINT) ──▶ close within deadline
//!                 └─ *. lifecycle::fatal (task failure / panic) ──▶ exit 1
//! ```

// Core subsystems
pub mod config;
pub mod database;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use http::{Application, HttpApp, ListeningHandle};
pub use lifecycle::{ExitStatus, LifecycleController, Shutdown};
