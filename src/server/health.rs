//! Probe and metrics endpoints, router assembly and the server loop
//!
//! - `/readyz` - Readiness: Is the tracker accepting events?
//! - `/metrics` - Prometheus metrics in text format
//!
//! The tracker's own endpoints (`/pods`, `/health`, `/stats`, `/test`) live
//! in `routes`.

use crate::server::metrics::SharedMetrics;
use crate::server::routes;
use crate::server::shutdown::ShutdownSignal;
use crate::tracker::Tracker;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared state for readiness tracking
///
/// Set once the tracker is built, cleared when shutdown starts.
#[derive(Debug, Clone)]
pub struct ReadinessState {
    ready: Arc<AtomicBool>,
}

impl ReadinessState {
    /// Create a new readiness state (initially not ready)
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark as not ready so the readiness probe returns 503 during shutdown
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Tracker>,
    pub readiness: ReadinessState,
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(tracker: Arc<Tracker>, readiness: ReadinessState, metrics: SharedMetrics) -> Self {
        Self {
            tracker,
            readiness,
            metrics,
        }
    }
}

/// Readiness probe handler
///
/// Returns 200 OK if ready, 503 Service Unavailable if not.
async fn readyz(State(state): State<AppState>) -> StatusCode {
    if state.readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Prometheus metrics handler
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Build the router for every endpoint
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/pods", post(routes::handle_pod_event))
        .route("/health", get(routes::health))
        .route("/stats", get(routes::stats))
        .route("/test", post(routes::send_test))
        .route("/readyz", get(readyz))
        .route("/metrics", get(self::metrics))
        .with_state(state)
}

/// Serve the router on `0.0.0.0:<port>` until shutdown is signaled
///
/// In-flight requests are drained before this returns.
pub async fn run_server(
    port: u16,
    state: AppState,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    // Log after successful bind - server is actually listening
    info!(port = %port, "Restart tracker listening (HTTP)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
