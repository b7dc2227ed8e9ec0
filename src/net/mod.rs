//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! host + port
//!     → listener.rs (bind, typed bind errors)
//!     → Hand off to HTTP layer
//!
//! Each request:
//!     → connection.rs (in-flight guard, released on completion)
//! ```

pub mod connection;
pub mod listener;

pub use connection::{InFlightGuard, InFlightTracker};
pub use listener::{bind, ListenError};
