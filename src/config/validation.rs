//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0)
//! - Validate addresses and URLs that are parsed later at startup
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::database::{resolve_address, DatabaseError};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("server.host {0:?} is not an IP address")]
    InvalidHost(String),

    #[error("database.url {url:?} is invalid: {reason}")]
    InvalidDatabaseUrl { url: String, reason: String },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let durations = [
        ("server.shutdown_timeout_secs", config.server.shutdown_timeout_secs),
        ("server.request_timeout_secs", config.server.request_timeout_secs),
        ("database.connect_timeout_secs", config.database.connect_timeout_secs),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    if config.server.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.server.host.clone()));
    }

    // Same resolution the connector runs at startup
    if let Err(DatabaseError::InvalidUrl { url, reason }) = resolve_address(&config.database.url) {
        errors.push(ValidationError::InvalidDatabaseUrl { url, reason });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
