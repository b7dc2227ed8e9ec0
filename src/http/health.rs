//! Health endpoint.
//!
//! Reports `ok` while the process accepts traffic and `503` once draining has
//! begun, so load balancers stop routing to an instance on its way out.

use std::sync::{Arc, OnceLock};

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::lifecycle::LifecycleState;

/// Shared state for the health handler.
#[derive(Clone)]
pub struct HealthState {
    environment: Arc<str>,
    listening_since: Arc<OnceLock<Instant>>,
    lifecycle: watch::Receiver<LifecycleState>,
}

impl HealthState {
    pub fn new(environment: &str, lifecycle: watch::Receiver<LifecycleState>) -> Self {
        Self {
            environment: Arc::from(environment),
            listening_since: Arc::new(OnceLock::new()),
            lifecycle,
        }
    }

    /// Start the uptime clock. Later calls keep the first instant.
    pub fn mark_listening(&self) {
        let _ = self.listening_since.set(Instant::now());
    }

    /// Seconds since the listener was bound, zero before that.
    pub fn uptime_secs(&self) -> u64 {
        self.listening_since
            .get()
            .map_or(0, |since| since.elapsed().as_secs())
    }
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub uptime_secs: u64,
}

pub async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let current = *state.lifecycle.borrow();

    // Requests can land between bind and the controller marking us running
    let (code, status) = match current {
        LifecycleState::Starting | LifecycleState::Running => (StatusCode::OK, "ok"),
        other => (StatusCode::SERVICE_UNAVAILABLE, other.as_str()),
    };

    let body = HealthResponse {
        status: status.to_string(),
        environment: state.environment.to_string(),
        uptime_secs: state.uptime_secs(),
    };

    (code, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::to_bytes;

    async fn call(state: HealthState) -> (StatusCode, HealthResponse) {
        let response = health(State(state)).await.into_response();
        let code = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (code, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn uptime_counts_from_listening() {
        let (_tx, rx) = watch::channel(LifecycleState::Starting);
        let state = HealthState::new("test", rx);

        // Database connect time before the bind is not uptime
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(call(state.clone()).await.1.uptime_secs, 0);

        state.mark_listening();
        tokio::time::advance(Duration::from_secs(3)).await;
        state.mark_listening();

        let (code, body) = call(state).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.uptime_secs, 3);
    }

    #[tokio::test]
    async fn terminal_state_is_unavailable() {
        let (_tx, rx) = watch::channel(LifecycleState::ForceKilled);
        let (code, body) = call(HealthState::new("test", rx)).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "force_killed");
    }
}
