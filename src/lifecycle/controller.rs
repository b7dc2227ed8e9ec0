//! Process lifecycle controller.
//!
//! ```text
//! STARTING ──db + listen ok──▶ RUNNING ──signal──▶ DRAINING ──close ok────▶ CLOSED (0)
//!    │                                                │  └──close error──▶ CLOSED (1)
//!    └──startup error──▶ FAILED (1)                   └──deadline──────────▶ FORCE-KILLED (1)
//!
//! any state ──fatal error──▶ FAILED (1)
//! ```

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::time::Duration;

use crate::config::ServerSettings;
use crate::database::DatabaseConnector;
use crate::http::{Application, ListeningHandle};
use crate::lifecycle::fatal::{self, FatalErrorReporter, FatalErrors};
use crate::lifecycle::shutdown::{LifecycleState, Shutdown};
use crate::lifecycle::signals::SignalSource;
use crate::lifecycle::startup;
use crate::observability::metrics;

/// Process exit status chosen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Clean shutdown.
    Success,
    /// Any failure path.
    Failure,
}

impl ExitStatus {
    /// Numeric process exit code.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

/// How draining ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The listener closed cleanly before the deadline.
    Closed,
    /// The listener closed before the deadline but reported an error.
    CloseFailed,
    /// The deadline elapsed first.
    TimedOut,
}

impl ShutdownOutcome {
    /// Terminal lifecycle state for this outcome.
    pub fn state(self) -> LifecycleState {
        match self {
            ShutdownOutcome::Closed | ShutdownOutcome::CloseFailed => LifecycleState::Closed,
            ShutdownOutcome::TimedOut => LifecycleState::ForceKilled,
        }
    }

    /// Exit status for this outcome. Close errors and timeouts share code 1.
    pub fn exit_status(self) -> ExitStatus {
        match self {
            ShutdownOutcome::Closed => ExitStatus::Success,
            ShutdownOutcome::CloseFailed | ShutdownOutcome::TimedOut => ExitStatus::Failure,
        }
    }

    /// Label used in metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownOutcome::Closed => "closed",
            ShutdownOutcome::CloseFailed => "close_failed",
            ShutdownOutcome::TimedOut => "timed_out",
        }
    }
}

/// Settings the controller needs from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub host: IpAddr,
    pub port: u16,
    pub environment: String,
    pub shutdown_timeout: Duration,
}

impl TryFrom<&ServerSettings> for LifecycleSettings {
    type Error = AddrParseError;

    fn try_from(settings: &ServerSettings) -> Result<Self, Self::Error> {
        Ok(Self {
            host: settings.host.parse()?,
            port: settings.port,
            environment: settings.environment.clone(),
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        })
    }
}

/// Owns startup ordering, signal-driven draining and fatal error handling.
pub struct LifecycleController<D, A, S> {
    settings: LifecycleSettings,
    database: D,
    app: A,
    signals: S,
    shutdown: Shutdown,
    reporter: FatalErrorReporter,
    fatal: FatalErrors,
}

impl<D, A, S> LifecycleController<D, A, S>
where
    D: DatabaseConnector,
    A: Application,
    S: SignalSource,
{
    /// Create a controller with its own shutdown state and fatal error channel.
    pub fn new(settings: LifecycleSettings, database: D, app: A, signals: S) -> Self {
        let (reporter, fatal) = fatal::channel();
        Self {
            settings,
            database,
            app,
            signals,
            shutdown: Shutdown::new(),
            reporter,
            fatal,
        }
    }

    /// Use a shutdown coordinator shared with the application.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Use a fatal error channel whose reporters were handed out before the
    /// controller existed.
    pub fn with_fatal_channel(
        mut self,
        reporter: FatalErrorReporter,
        fatal: FatalErrors,
    ) -> Self {
        self.reporter = reporter;
        self.fatal = fatal;
        self
    }

    /// The shutdown coordinator driven by this controller.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Reporter whose errors terminate the process.
    pub fn fatal_reporter(&self) -> FatalErrorReporter {
        self.reporter.clone()
    }

    /// Run the lifecycle to completion and return the exit status.
    pub async fn run(self) -> ExitStatus {
        let Self {
            settings,
            database,
            app,
            mut signals,
            shutdown,
            reporter,
            mut fatal,
        } = self;

        // Only external clones keep the fatal channel open from here on
        drop(reporter);

        let lifecycle = drive(&settings, &database, &app, &mut signals, &shutdown);

        tokio::select! {
            biased;
            error = fatal.recv() => {
                tracing::error!(kind = error.kind(), error = %error, "Unrecoverable error, exiting");
                metrics::record_fatal(error.kind());
                shutdown.finish(LifecycleState::Failed);
                ExitStatus::Failure
            }
            status = lifecycle => status,
        }
    }
}

async fn drive<D, A, S>(
    settings: &LifecycleSettings,
    database: &D,
    app: &A,
    signals: &mut S,
    shutdown: &Shutdown,
) -> ExitStatus
where
    D: DatabaseConnector,
    A: Application,
    S: SignalSource,
{
    let addr = SocketAddr::new(settings.host, settings.port);

    let handle = match startup::start(database, app, addr).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            shutdown.finish(LifecycleState::Failed);
            return ExitStatus::Failure;
        }
    };

    shutdown.mark_running();

    let port = handle.local_addr().port();
    tracing::info!(port, "Server running");
    tracing::info!(environment = %settings.environment, "Environment");
    tracing::info!(url = %format!("http://localhost:{port}/health"), "Health check");

    match signals.recv().await {
        Some(signal) => {
            tracing::info!(%signal, "Received signal, starting graceful shutdown");
        }
        None => tracing::warn!("Signal source closed, starting graceful shutdown"),
    }
    shutdown.begin_draining();

    let outcome = drain(handle, settings.shutdown_timeout, signals).await;
    metrics::record_shutdown(outcome.as_str());
    shutdown.finish(outcome.state());
    outcome.exit_status()
}

/// Close `handle` within `timeout`, ignoring further signals meanwhile.
async fn drain<H, S>(handle: H, timeout: Duration, signals: &mut S) -> ShutdownOutcome
where
    H: ListeningHandle,
    S: SignalSource,
{
    let close = handle.close();
    tokio::pin!(close);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut signals_open = true;

    loop {
        tokio::select! {
            biased;
            result = &mut close => {
                return match result {
                    Ok(()) => {
                        tracing::info!("Server closed successfully");
                        ShutdownOutcome::Closed
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Error during server close");
                        ShutdownOutcome::CloseFailed
                    }
                };
            }
            _ = &mut deadline => {
                tracing::error!(timeout = ?timeout, "Forced shutdown after timeout");
                return ShutdownOutcome::TimedOut;
            }
            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => {
                    tracing::debug!(%signal, "Shutdown already in progress, ignoring signal");
                }
                None => signals_open = false,
            },
        }
    }
}
