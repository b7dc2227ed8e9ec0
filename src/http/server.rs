//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health handler
//! - Wire up middleware (tracing, timeout, request ID, in-flight tracking)
//! - Bind server to listener and serve in a background task
//! - Report the serve loop dying on its own as a fatal error
//! - Close with graceful shutdown when the controller asks

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerSettings;
use crate::http::health::{self, HealthState};
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::http::{Application, CloseError, ListeningHandle};
use crate::lifecycle::{FatalError, FatalErrorReporter, LifecycleState};
use crate::net::{self, InFlightTracker, ListenError};

/// The HTTP application served by this process.
#[derive(Clone)]
pub struct HttpApp {
    router: Router,
    health: HealthState,
    in_flight: InFlightTracker,
    fatal: Option<FatalErrorReporter>,
}

impl HttpApp {
    /// Build the application. `lifecycle` feeds the health endpoint.
    pub fn new(settings: &ServerSettings, lifecycle: watch::Receiver<LifecycleState>) -> Self {
        let in_flight = InFlightTracker::new();
        let health_state = HealthState::new(&settings.environment, lifecycle);
        let router = Self::build_router(
            health_state.clone(),
            in_flight.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        );
        Self {
            router,
            health: health_state,
            in_flight,
            fatal: None,
        }
    }

    /// Report a serve loop that fails before `close` was asked for.
    pub fn with_fatal_reporter(mut self, reporter: FatalErrorReporter) -> Self {
        self.fatal = Some(reporter);
        self
    }

    /// Requests currently being served.
    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        health_state: HealthState,
        in_flight: InFlightTracker,
        request_timeout: Duration,
    ) -> Router {
        Router::new()
            .route("/health", get(health::health))
            .with_state(health_state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(middleware::from_fn_with_state(in_flight, track_in_flight))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                    let request_id = req
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "request",
                        %request_id,
                        method = %req.method(),
                        uri = %req.uri()
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}

#[async_trait]
impl Application for HttpApp {
    type Handle = HttpHandle;

    async fn listen(&self, addr: SocketAddr) -> Result<HttpHandle, ListenError> {
        let listener = net::bind(addr).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenError::Bind { address: addr, source })?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let closing = shutdown_rx.clone();
        let router = self.router.clone();
        let fatal = self.fatal.clone();

        // A dropped sender also ends the server: an unowned handle cannot leak a socket
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await;
            report_serve_failure(fatal.as_ref(), *closing.borrow(), &result);
            result
        });

        self.health.mark_listening();
        tracing::info!(address = %local_addr, "HTTP server listening");

        Ok(HttpHandle {
            local_addr,
            shutdown_tx,
            task,
            in_flight: self.in_flight.clone(),
        })
    }
}

/// Handle to a running HTTP server.
pub struct HttpHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<io::Result<()>>,
    in_flight: InFlightTracker,
}

#[async_trait]
impl ListeningHandle for HttpHandle {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn close(self) -> Result<(), CloseError> {
        tracing::info!(
            address = %self.local_addr,
            in_flight = self.in_flight.active_count(),
            "Closing listener, draining in-flight requests"
        );

        let _ = self.shutdown_tx.send(true);

        match self.task.await {
            Ok(result) => result.map_err(CloseError::from),
            Err(e) => Err(CloseError::Task(e.to_string())),
        }
    }
}

async fn track_in_flight(
    State(tracker): State<InFlightTracker>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = tracker.track();
    next.run(request).await
}

/// Errors after `close` reach the controller through the handle instead.
fn report_serve_failure(
    reporter: Option<&FatalErrorReporter>,
    closing: bool,
    result: &io::Result<()>,
) {
    if let (Some(reporter), false, Err(e)) = (reporter, closing, result) {
        tracing::error!(error = %e, "HTTP server stopped unexpectedly");
        reporter.report(FatalError::TaskFailed {
            task: "http-server".to_string(),
            reason: e.to_string(),
        });
    }
}
