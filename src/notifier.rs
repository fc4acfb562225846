//! Push notifications through an ntfy-compatible endpoint
//!
//! ntfy carries the title, priority and tags as HTTP headers, so those fields
//! are reduced to printable ASCII here, at the adapter boundary. The message
//! body is sent untouched as UTF-8.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Longest title forwarded to the endpoint, in characters
pub const MAX_TITLE_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification endpoint unreachable: {0}")]
    Transport(String),

    #[error("notification endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}

/// ntfy message priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Min,
    Low,
    Default,
    High,
    Max,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Min => "min",
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::High => "high",
            Priority::Max => "max",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification as composed by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub tags: Vec<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority,
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Trait for delivering notifications
///
/// Production code uses `NtfyNotifier`. Tests use `MockNotifier` which
/// records notifications in memory. Delivery failures are logged by the
/// implementation and reported as `false`; they never reach the caller as
/// errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> bool;
}

/// Strip everything that cannot travel in an HTTP header value
///
/// Keeps printable ASCII and spaces, then trims surrounding whitespace.
pub fn header_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Header-safe title, capped at `MAX_TITLE_LEN`
pub fn header_title(title: &str) -> String {
    header_safe(title).chars().take(MAX_TITLE_LEN).collect()
}

/// Header-safe tags; tags that end up empty are dropped
pub fn header_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| header_safe(tag))
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Notifier posting to `<base_url>/<topic>`
pub struct NtfyNotifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl NtfyNotifier {
    pub fn new(base_url: &str, topic: &str, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build ntfy HTTP client, using default");
                reqwest::Client::new()
            }
        };
        Self {
            client,
            url: format!("{}/{}", base_url.trim_end_matches('/'), topic),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one notification, surfacing every failure as `NotifyError`
    pub async fn post(&self, notification: &Notification) -> Result<String, NotifyError> {
        let title = header_title(&notification.title);
        let tags = header_tags(&notification.tags);

        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header("Title", title.as_str())
            .header("Priority", notification.priority.as_str())
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(notification.message.clone());
        if !tags.is_empty() {
            request = request.header("Tags", tags.join(","));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout(self.timeout)
            } else {
                NotifyError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        Ok(title)
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn notify(&self, notification: &Notification) -> bool {
        match self.post(notification).await {
            Ok(title) => {
                info!(title = %title, priority = %notification.priority, "Notification sent");
                true
            }
            Err(e) => {
                error!(error = %e, url = %self.url, "Failed to send notification");
                false
            }
        }
    }
}

/// Mock notifier for testing - stores notifications in memory
#[cfg(test)]
pub struct MockNotifier {
    sent: std::sync::Mutex<Vec<Notification>>,
    succeed: bool,
}

#[cfg(test)]
impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            succeed: true,
        }
    }

    /// A notifier whose deliveries all fail (notifications are still recorded)
    pub fn failing() -> Self {
        Self {
            succeed: false,
            ..Self::new()
        }
    }

    #[allow(clippy::unwrap_used)]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notification: &Notification) -> bool {
        #[allow(clippy::unwrap_used)]
        self.sent.lock().unwrap().push(notification.clone());
        self.succeed
    }
}

#[cfg(test)]
#[path = "notifier_test.rs"]
mod tests;
