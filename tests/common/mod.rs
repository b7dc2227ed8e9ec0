//! Shared fakes for lifecycle integration tests.
#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lifecycle_server::database::{DatabaseConnector, DatabaseError};
use lifecycle_server::http::{Application, CloseError, ListeningHandle};
use lifecycle_server::lifecycle::LifecycleSettings;
use lifecycle_server::net::ListenError;

/// A collaborator call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Listen(SocketAddr),
    Close,
}

/// Ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }
}

pub fn settings(port: u16) -> LifecycleSettings {
    LifecycleSettings {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port,
        environment: "test".to_string(),
        shutdown_timeout: Duration::from_secs(10),
    }
}

pub struct FakeDatabase {
    log: CallLog,
    fail: bool,
}

impl FakeDatabase {
    pub fn reachable(log: &CallLog) -> Self {
        Self { log: log.clone(), fail: false }
    }

    pub fn unreachable(log: &CallLog) -> Self {
        Self { log: log.clone(), fail: true }
    }
}

#[async_trait]
impl DatabaseConnector for FakeDatabase {
    async fn connect(&self) -> Result<(), DatabaseError> {
        self.log.push(Call::Connect);
        if self.fail {
            return Err(DatabaseError::Timeout {
                address: "db.internal:5432".to_string(),
                timeout: Duration::from_secs(5),
            });
        }
        Ok(())
    }
}

/// Application whose handle takes `close_after` to drain.
pub struct FakeApp {
    log: CallLog,
    fail_listen: bool,
    close_after: Duration,
    close_fails: bool,
}

impl FakeApp {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_listen: false,
            close_after: Duration::ZERO,
            close_fails: false,
        }
    }

    pub fn failing_listen(mut self) -> Self {
        self.fail_listen = true;
        self
    }

    pub fn close_after(mut self, duration: Duration) -> Self {
        self.close_after = duration;
        self
    }

    pub fn close_fails(mut self) -> Self {
        self.close_fails = true;
        self
    }
}

#[async_trait]
impl Application for FakeApp {
    type Handle = FakeHandle;

    async fn listen(&self, addr: SocketAddr) -> Result<FakeHandle, ListenError> {
        self.log.push(Call::Listen(addr));
        if self.fail_listen {
            return Err(ListenError::Other("address already in use".to_string()));
        }
        Ok(FakeHandle {
            addr,
            log: self.log.clone(),
            close_after: self.close_after,
            close_fails: self.close_fails,
        })
    }
}

pub struct FakeHandle {
    addr: SocketAddr,
    log: CallLog,
    close_after: Duration,
    close_fails: bool,
}

#[async_trait]
impl ListeningHandle for FakeHandle {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn close(self) -> Result<(), CloseError> {
        self.log.push(Call::Close);
        tokio::time::sleep(self.close_after).await;
        if self.close_fails {
            return Err(CloseError::Serve(std::io::Error::other("connection reset")));
        }
        Ok(())
    }
}

/// Find a free local port. Another process may grab it before use.
pub async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
