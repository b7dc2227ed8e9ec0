//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Connect database → Start listener
//!
//! Shutdown (controller.rs, shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight requests → Exit
//!                                  └── deadline elapsed → Forced exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown (first one only)
//!
//! Fatal errors (fatal.rs):
//!     Unobserved task failure / panic → Exit 1
//! ```
//!
//! # Design Decisions
//! - Ordered startup: database first, then listener
//! - Shutdown has timeout: forced exit after deadline
//! - Collaborators are injected; only the binary touches `process::exit`

pub mod controller;
pub mod fatal;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use controller::{ExitStatus, LifecycleController, LifecycleSettings, ShutdownOutcome};
pub use fatal::{FatalError, FatalErrorReporter, FatalErrors};
pub use shutdown::{LifecycleState, Shutdown};
pub use signals::{ChannelSignals, OsSignals, SignalSource, TerminationSignal};
pub use startup::StartupError;
