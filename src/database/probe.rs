//! TCP reachability connector.
//!
//! Resolves the host and port out of a database URL and opens a single TCP
//! connection to it within the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use url::Url;

use crate::config::DatabaseSettings;
use crate::database::{DatabaseConnector, DatabaseError};

/// Connector that checks the database endpoint accepts TCP connections.
#[derive(Debug, Clone)]
pub struct TcpProbeConnector {
    address: String,
    timeout: Duration,
}

impl TcpProbeConnector {
    /// Build a connector from the database settings.
    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self, DatabaseError> {
        let address = resolve_address(&settings.url)?;
        Ok(Self {
            address,
            timeout: Duration::from_secs(settings.connect_timeout_secs),
        })
    }

    /// The `host:port` this connector probes.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl DatabaseConnector for TcpProbeConnector {
    async fn connect(&self) -> Result<(), DatabaseError> {
        tracing::debug!(address = %self.address, timeout = ?self.timeout, "Connecting to database");

        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => {
                tracing::info!(address = %self.address, "Database connected");
                Ok(())
            }
            Ok(Err(source)) => Err(DatabaseError::Unreachable {
                address: self.address.clone(),
                source,
            }),
            Err(_) => Err(DatabaseError::Timeout {
                address: self.address.clone(),
                timeout: self.timeout,
            }),
        }
    }
}

/// Default port for well-known database schemes.
fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "postgres" | "postgresql" => Some(5432),
        "mysql" | "mariadb" => Some(3306),
        "mongodb" => Some(27017),
        "redis" | "rediss" => Some(6379),
        _ => None,
    }
}

/// Turn a database URL into a `host:port` string.
pub fn resolve_address(raw: &str) -> Result<String, DatabaseError> {
    let invalid = |reason: &str| DatabaseError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let port = url
        .port()
        .or_else(|| default_port(url.scheme()))
        .ok_or_else(|| invalid("missing port and no default for scheme"))?;

    // IPv6 hosts come back bracketed from host_str, ready for host:port
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn explicit_port_wins() {
        assert_eq!(
            resolve_address("postgres://user:pw@db.internal:6543/app").unwrap(),
            "db.internal:6543"
        );
    }

    #[test]
    fn scheme_default_ports() {
        assert_eq!(resolve_address("postgresql://db/app").unwrap(), "db:5432");
        assert_eq!(resolve_address("mongodb://127.0.0.1/app").unwrap(), "127.0.0.1:27017");
        assert_eq!(resolve_address("redis://[::1]").unwrap(), "[::1]:6379");
    }

    #[test]
    fn unknown_scheme_without_port_is_invalid() {
        let err = resolve_address("custom://db/app").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let connector = TcpProbeConnector::from_settings(&DatabaseSettings {
            url: format!("postgres://127.0.0.1:{port}/app"),
            connect_timeout_secs: 1,
        })
        .unwrap();

        connector.connect().await.unwrap();
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = TcpProbeConnector::from_settings(&DatabaseSettings {
            url: format!("postgres://127.0.0.1:{port}/app"),
            connect_timeout_secs: 1,
        })
        .unwrap();

        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, DatabaseError::Unreachable { .. }));
    }
}
