//! Tracker endpoints
//!
//! `/pods` receives CloudEvents from the cluster event source. Decode
//! failures answer 500 with the reason so the source logs something useful;
//! nothing is recorded for a rejected event.

use crate::server::health::AppState;
use crate::tracker::decode_pod_event;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn ok_with(message: impl Into<String>) -> Self {
        Self {
            status: "ok",
            message: Some(message.into()),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cluster: String,
    pub tracked_pods: usize,
}

/// POST /pods
pub async fn handle_pod_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.metrics.record_event();

    let event = match decode_pod_event(&headers, body.to_vec()) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Rejected pod event");
            state.metrics.record_event_error();
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::error(e.to_string())),
            );
        }
    };

    info!(id = %event.id, event_type = %event.event_type, "Received pod event");
    let report = state.tracker.ingest(&event.pod).await;
    if report.alerts_raised > 0 {
        info!(
            pod = event.pod.name(),
            alerts = report.alerts_raised,
            delivered = report.notifications_delivered,
            "Pod event processed"
        );
    }

    (StatusCode::OK, Json(StatusResponse::ok()))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        cluster: state.tracker.config().cluster_name.clone(),
        tracked_pods: state.tracker.history().tracked_keys(),
    })
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tracker.history().snapshot())
}

/// POST /test
///
/// Always answers 200; a failed delivery only shows up in the logs.
pub async fn send_test(State(state): State<AppState>) -> Json<StatusResponse> {
    state.tracker.send_test_notification().await;
    Json(StatusResponse::ok_with("Test notification sent"))
}
