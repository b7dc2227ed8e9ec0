//! Shutdown coordination for the server.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::observability::metrics;

/// Process lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Connecting to the database and binding the listener.
    Starting,
    /// Listening and serving traffic.
    Running,
    /// Stop accepting, finishing in-flight requests.
    Draining,
    /// Listener closed before the deadline.
    Closed,
    /// Deadline elapsed before the listener closed.
    ForceKilled,
    /// Startup failed or a fatal error was intercepted.
    Failed,
}

impl LifecycleState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Closed | LifecycleState::ForceKilled | LifecycleState::Failed
        )
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Closed => "closed",
            LifecycleState::ForceKilled => "force_killed",
            LifecycleState::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinator for graceful shutdown.
///
/// Holds the lifecycle state in a watch channel that any task can subscribe
/// to. The `Running → Draining` step doubles as the shutdown-in-progress flag.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Shutdown {
    /// Create a new coordinator in the `Starting` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        metrics::record_state(LifecycleState::Starting);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// `Starting → Running`. Returns false if the state was not `Starting`.
    pub fn mark_running(&self) -> bool {
        self.transition(|state| *state == LifecycleState::Starting, LifecycleState::Running)
    }

    /// `Running → Draining`. Only the first caller gets `true`.
    pub fn begin_draining(&self) -> bool {
        self.transition(|state| *state == LifecycleState::Running, LifecycleState::Draining)
    }

    /// Move to a terminal state. Returns false if already terminal.
    pub fn finish(&self, terminal: LifecycleState) -> bool {
        debug_assert!(terminal.is_terminal());
        self.transition(|state| !state.is_terminal(), terminal)
    }

    fn transition<F>(&self, allowed: F, next: LifecycleState) -> bool
    where
        F: Fn(&LifecycleState) -> bool,
    {
        let changed = self.tx.send_if_modified(|state| {
            if allowed(state) {
                *state = next;
                true
            } else {
                false
            }
        });
        if changed {
            metrics::record_state(next);
        }
        changed
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draining_only_once() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.begin_draining(), "cannot drain before running");

        assert!(shutdown.mark_running());
        assert_eq!(shutdown.state(), LifecycleState::Running);

        assert!(shutdown.begin_draining());
        assert!(!shutdown.begin_draining());
        assert_eq!(shutdown.state(), LifecycleState::Draining);
    }

    #[test]
    fn terminal_states_stick() {
        let shutdown = Shutdown::new();
        shutdown.mark_running();
        shutdown.begin_draining();

        assert!(shutdown.finish(LifecycleState::Closed));
        assert!(!shutdown.finish(LifecycleState::ForceKilled));
        assert!(!shutdown.mark_running());
        assert_eq!(shutdown.state(), LifecycleState::Closed);
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        shutdown.mark_running();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Running);

        shutdown.begin_draining();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Draining);
    }
}
