//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM and SIGINT both request graceful shutdown
//! - The source is injected into the controller, so tests drive it from a channel

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// A termination request delivered to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGTERM, typically from a process supervisor.
    Terminate,
    /// SIGINT, typically Ctrl+C.
    Interrupt,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Terminate => f.write_str("SIGTERM"),
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
        }
    }
}

/// Something that yields termination signals.
#[async_trait]
pub trait SignalSource: Send {
    /// Wait for the next signal. `None` means no more signals can arrive.
    async fn recv(&mut self) -> Option<TerminationSignal>;
}

/// Signals delivered by the operating system.
pub struct OsSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Install the process signal handlers. Must be called inside a runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Install the process signal handlers. Must be called inside a runtime.
    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            received = self.terminate.recv() => received.map(|_| TerminationSignal::Terminate),
            received = self.interrupt.recv() => received.map(|_| TerminationSignal::Interrupt),
        }
    }

    // `ctrl_c` is the only portable termination signal outside unix
    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|_| TerminationSignal::Interrupt)
    }
}

/// Signals fed through a channel, for embedding and tests.
#[derive(Debug)]
pub struct ChannelSignals {
    rx: mpsc::Receiver<TerminationSignal>,
}

impl ChannelSignals {
    /// Create a source and the sender that feeds it.
    pub fn new(buffer: usize) -> (mpsc::Sender<TerminationSignal>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl SignalSource for ChannelSignals {
    async fn recv(&mut self) -> Option<TerminationSignal> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names() {
        assert_eq!(TerminationSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(TerminationSignal::Interrupt.to_string(), "SIGINT");
    }

    #[tokio::test]
    async fn channel_source_ends_when_senders_drop() {
        let (tx, mut signals) = ChannelSignals::new(2);
        tx.send(TerminationSignal::Interrupt).await.unwrap();
        drop(tx);

        assert_eq!(signals.recv().await, Some(TerminationSignal::Interrupt));
        assert_eq!(signals.recv().await, None);
    }
}
