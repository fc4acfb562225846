//! Best-effort container log enrichment
//!
//! Follows the same trait-based pattern as the notifier:
//! - `LogSource` trait for abstraction
//! - `KubectlLogSource` shells out to `kubectl logs`
//! - `KubeApiLogSource` reads the log subresource through kube-rs
//! - `MockLogSource` for testing
//!
//! Fetches are throttled per container by `LogFetchLimiter`. A failed fetch
//! is never fatal to an ingest.

use crate::tracker::history::PodContainerKey;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Characters of log output kept in a notification
pub const LOG_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum LogFetchError {
    #[error("failed to run {binary}: {reason}")]
    Spawn { binary: String, reason: String },

    #[error("kubectl exited with {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("log fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Kubernetes API error: {0}")]
    Api(String),
}

/// Trait for reading the tail of a container log
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn tail(&self, key: &PodContainerKey, lines: i64) -> Result<String, LogFetchError>;
}

/// Log source running `kubectl logs -n <ns> <pod> -c <container> --tail <n>`
pub struct KubectlLogSource {
    binary: String,
    timeout: std::time::Duration,
}

impl KubectlLogSource {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            binary: "kubectl".to_string(),
            timeout,
        }
    }

    /// Use a different executable (tests, non-standard installs)
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

/// Arguments passed to `kubectl` for a log tail
pub fn kubectl_args(key: &PodContainerKey, lines: i64) -> Vec<String> {
    vec![
        "logs".to_string(),
        "-n".to_string(),
        key.namespace.clone(),
        key.pod_name.clone(),
        "-c".to_string(),
        key.container_name.clone(),
        "--tail".to_string(),
        lines.to_string(),
    ]
}

#[async_trait]
impl LogSource for KubectlLogSource {
    async fn tail(&self, key: &PodContainerKey, lines: i64) -> Result<String, LogFetchError> {
        let output = tokio::process::Command::new(&self.binary)
            .args(kubectl_args(key, lines))
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| LogFetchError::Timeout(self.timeout))?
            .map_err(|e| LogFetchError::Spawn {
                binary: self.binary.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(LogFetchError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Log source reading `pods/log` through the Kubernetes API
pub struct KubeApiLogSource {
    client: kube::Client,
    timeout: std::time::Duration,
}

impl KubeApiLogSource {
    pub fn new(client: kube::Client, timeout: std::time::Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl LogSource for KubeApiLogSource {
    async fn tail(&self, key: &PodContainerKey, lines: i64) -> Result<String, LogFetchError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &key.namespace);
        let params = LogParams {
            container: Some(key.container_name.clone()),
            tail_lines: Some(lines),
            ..Default::default()
        };

        tokio::time::timeout(self.timeout, pods.logs(&key.pod_name, &params))
            .await
            .map_err(|_| LogFetchError::Timeout(self.timeout))?
            .map_err(|e| LogFetchError::Api(e.to_string()))
    }
}

/// Last `LOG_EXCERPT_CHARS` characters of a log, on a char boundary
pub fn log_excerpt(logs: &str) -> &str {
    let total = logs.chars().count();
    if total <= LOG_EXCERPT_CHARS {
        return logs;
    }
    let skip = total - LOG_EXCERPT_CHARS;
    match logs.char_indices().nth(skip) {
        Some((offset, _)) => &logs[offset..],
        None => logs,
    }
}

/// Per-container throttle for log fetches
///
/// A slot is claimed before the fetch starts, so concurrent ingests for the
/// same container fetch at most once per interval.
#[derive(Debug)]
pub struct LogFetchLimiter {
    interval: Duration,
    last_fetched: Mutex<HashMap<PodContainerKey, DateTime<Utc>>>,
}

impl LogFetchLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fetched: Mutex::new(HashMap::new()),
        }
    }

    /// Claim the fetch slot for `key` if the last fetch is older than the interval
    pub fn try_claim(&self, key: &PodContainerKey, now: DateTime<Utc>) -> bool {
        let mut last_fetched = self
            .last_fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(last) = last_fetched.get(key) {
            if now - *last <= self.interval {
                return false;
            }
        }
        last_fetched.insert(key.clone(), now);
        true
    }

    /// Forget containers whose throttle has already expired
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut last_fetched = self
            .last_fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = last_fetched.len();
        last_fetched.retain(|_, last| now - *last <= self.interval);
        before - last_fetched.len()
    }

    pub fn len(&self) -> usize {
        self.last_fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mock log source for testing
///
/// Returns a preconfigured response and counts calls.
#[cfg(test)]
pub struct MockLogSource {
    response: Result<String, String>,
    call_count: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl MockLogSource {
    pub fn new(logs: &str) -> Self {
        Self {
            response: Ok(logs.to_string()),
            call_count: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn new_failing(error_msg: &str) -> Self {
        Self {
            response: Err(error_msg.to_string()),
            call_count: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.call_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
#[async_trait]
impl LogSource for MockLogSource {
    async fn tail(&self, _key: &PodContainerKey, _lines: i64) -> Result<String, LogFetchError> {
        self.call_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.response.clone().map_err(LogFetchError::Api)
    }
}
