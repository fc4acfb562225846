//! HTTP surface of the restart tracker
//!
//! - `/pods` - CloudEvent intake
//! - `/health`, `/stats`, `/test` - status and diagnostics
//! - `/readyz` - Readiness probe (tracker is ready to accept events)
//! - `/metrics` - Prometheus scrape endpoint
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod health;
pub mod metrics;
mod routes;
pub mod shutdown;

pub use health::{build_router, run_server, AppState, ReadinessState};
pub use metrics::{create_metrics, SharedMetrics, TrackerMetrics};
pub use routes::{HealthResponse, StatusResponse};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
