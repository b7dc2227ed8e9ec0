//! Metrics collection and exposition.
//!
//! # Metrics
//! - `server_lifecycle_state` (gauge): 0=starting, 1=running, 2=draining,
//!   3=closed, 4=force_killed, 5=failed
//! - `server_shutdowns_total` (counter): by outcome
//! - `server_fatal_errors_total` (counter): by kind
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::LifecycleState;

/// Install the Prometheus exporter on `addr`. Must be called inside a runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_state(state: LifecycleState) {
    let code = match state {
        LifecycleState::Starting => 0.0,
        LifecycleState::Running => 1.0,
        LifecycleState::Draining => 2.0,
        LifecycleState::Closed => 3.0,
        LifecycleState::ForceKilled => 4.0,
        LifecycleState::Failed => 5.0,
    };
    ::metrics::gauge!("server_lifecycle_state").set(code);
}

pub fn record_shutdown(outcome: &'static str) {
    ::metrics::counter!("server_shutdowns_total", "outcome" => outcome).increment(1);
}

pub fn record_fatal(kind: &'static str) {
    ::metrics::counter!("server_fatal_errors_total", "kind" => kind).increment(1);
}
