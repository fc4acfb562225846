//! Pod snapshots delivered as CloudEvents
//!
//! Event sources forward the full Pod object as event data. Every field is
//! optional on the wire; accessors fall back to the same defaults the
//! Kubernetes API would imply (`default` namespace, zero restarts).

use axum::http::HeaderMap;
use cloudevents::binding::http::to_event;
use cloudevents::{AttributesReader, Data, Event};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid CloudEvent: {0}")]
    Decode(String),

    #[error("CloudEvent carries no data")]
    MissingData,

    #[error("event data is not a Pod object: {0}")]
    InvalidPod(String),
}

/// A decoded pod event
#[derive(Debug, Clone)]
pub struct PodEvent {
    pub id: String,
    pub event_type: String,
    pub pod: PodSnapshot,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodSnapshot {
    pub metadata: PodMetadata,
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodMetadata {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodStatus {
    pub phase: Option<String>,
    pub container_statuses: Option<Vec<ContainerStatus>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerStatus {
    pub name: Option<String>,
    pub restart_count: Option<i64>,
    pub state: Option<ContainerState>,
    pub last_state: Option<ContainerState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerState {
    pub waiting: Option<StateWaiting>,
    pub running: Option<Value>,
    pub terminated: Option<StateTerminated>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StateWaiting {
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StateTerminated {
    pub reason: Option<String>,
    pub message: Option<String>,
    pub exit_code: Option<i64>,
}

impl PodSnapshot {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    pub fn phase(&self) -> &str {
        self.status.phase.as_deref().unwrap_or("Unknown")
    }

    pub fn containers(&self) -> &[ContainerStatus] {
        self.status.container_statuses.as_deref().unwrap_or(&[])
    }
}

impl ContainerStatus {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    /// Cumulative restart count, negative values clamped to zero
    pub fn restart_count(&self) -> u32 {
        let count = self.restart_count.unwrap_or(0).max(0);
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Decode an HTTP request (binary or structured mode) into a pod event
pub fn decode_pod_event(headers: &HeaderMap, body: Vec<u8>) -> Result<PodEvent, EventError> {
    let event = to_event(headers, body).map_err(|e| EventError::Decode(e.to_string()))?;
    pod_event_from(&event)
}

/// Extract the pod snapshot carried by a CloudEvent
pub fn pod_event_from(event: &Event) -> Result<PodEvent, EventError> {
    let data = match event.data() {
        Some(Data::Json(value)) => value.clone(),
        Some(Data::String(text)) => {
            serde_json::from_str(text).map_err(|e| EventError::InvalidPod(e.to_string()))?
        }
        Some(Data::Binary(bytes)) => {
            serde_json::from_slice(bytes).map_err(|e| EventError::InvalidPod(e.to_string()))?
        }
        None => return Err(EventError::MissingData),
    };

    if !data.is_object() {
        return Err(EventError::InvalidPod(format!(
            "expected a JSON object, got {}",
            json_kind(&data)
        )));
    }

    let pod: PodSnapshot =
        serde_json::from_value(data).map_err(|e| EventError::InvalidPod(e.to_string()))?;

    Ok(PodEvent {
        id: event.id().to_string(),
        event_type: event.ty().to_string(),
        pod,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
