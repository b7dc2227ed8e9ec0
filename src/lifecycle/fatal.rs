//! Fatal error interception.
//!
//! # Responsibilities
//! - Surface failures of background tasks nobody awaits
//! - Surface panics from anywhere in the process
//! - Deliver both to the controller, which exits with status 1
//!
//! # Design Decisions
//! - Every report is fatal; there is no in-process recovery
//! - Reports go through a channel so the controller decides when to exit

use std::fmt;
use std::future::Future;
use std::panic::PanicHookInfo;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An error that no handler observed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// A background task returned an error.
    #[error("task {task:?} failed: {reason}")]
    TaskFailed { task: String, reason: String },

    /// A panic escaped its task or thread.
    #[error("panic: {message}")]
    Panic { message: String },
}

impl FatalError {
    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FatalError::TaskFailed { .. } => "unhandled_task_failure",
            FatalError::Panic { .. } => "panic",
        }
    }
}

/// Create a connected reporter and receiver.
pub fn channel() -> (FatalErrorReporter, FatalErrors) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FatalErrorReporter { tx }, FatalErrors { rx })
}

/// Cloneable handle used to report fatal errors.
#[derive(Debug, Clone)]
pub struct FatalErrorReporter {
    tx: mpsc::UnboundedSender<FatalError>,
}

impl FatalErrorReporter {
    /// Report a fatal error. Dropped silently once the controller is gone.
    pub fn report(&self, error: FatalError) {
        let _ = self.tx.send(error);
    }

    /// Spawn a background task whose failure terminates the process.
    ///
    /// An `Err` result or a panic inside `future` is reported as fatal.
    pub fn spawn<F, E>(&self, task: impl Into<String>, future: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let task = task.into();
        let reporter = self.clone();
        let inner = tokio::spawn(future);

        tokio::spawn(async move {
            let error = match inner.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => FatalError::TaskFailed {
                    task,
                    reason: e.to_string(),
                },
                Err(join) if join.is_panic() => FatalError::Panic {
                    message: panic_message(join.into_panic().as_ref()),
                },
                // Cancelled through the runtime shutting down, not a failure
                Err(_) => return,
            };
            reporter.report(error);
        })
    }

    /// Install a process-wide panic hook that logs through tracing and
    /// reports the panic.
    pub fn install_panic_hook(&self) {
        let reporter = self.clone();
        std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            tracing_panic::panic_hook(info);
            reporter.report(FatalError::Panic {
                message: describe_panic(info),
            });
        }));
    }
}

/// Receiving side, owned by the controller.
#[derive(Debug)]
pub struct FatalErrors {
    rx: mpsc::UnboundedReceiver<FatalError>,
}

impl FatalErrors {
    /// Wait for the next fatal error.
    ///
    /// Never resolves once every reporter is gone: no more errors can arrive.
    pub async fn recv(&mut self) -> FatalError {
        match self.rx.recv().await {
            Some(error) => error,
            None => std::future::pending().await,
        }
    }
}

fn describe_panic(info: &PanicHookInfo<'_>) -> String {
    let message = panic_message(info.payload());
    match info.location() {
        Some(location) => format!("{message} at {location}"),
        None => message,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
