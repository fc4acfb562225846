//! Pod event processing
//!
//! `Tracker` ties the restart history, rate analysis, log enrichment and the
//! notifier together. It is built once at startup and shared with the HTTP
//! handlers and the eviction sweeper through an `Arc`.

use crate::config::TrackerConfig;
use crate::notifier::{Notification, Notifier, Priority};
use crate::server::SharedMetrics;
use crate::tracker::analyzer::classify_priority;
use crate::tracker::clock::Clock;
use crate::tracker::event::{ContainerStatus, PodSnapshot};
use crate::tracker::history::{PodContainerKey, RestartHistory};
use crate::tracker::logs::{log_excerpt, LogFetchLimiter, LogSource};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ALERT_TAGS: [&str; 2] = ["warning", "rotating_light"];
pub const TEST_TAGS: [&str; 2] = ["bell", "white_check_mark"];
pub const STARTUP_TAGS: [&str; 2] = ["rocket", "information_source"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Outcome of processing one pod snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub containers_checked: usize,
    pub alerts_raised: usize,
    pub notifications_delivered: usize,
}

/// Entries dropped by one eviction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub history_keys: usize,
    pub log_fetch_entries: usize,
}

pub struct Tracker {
    config: TrackerConfig,
    history: RestartHistory,
    log_limiter: LogFetchLimiter,
    notifier: Arc<dyn Notifier>,
    /// None when log enrichment is disabled
    log_source: Option<Arc<dyn LogSource>>,
    clock: Arc<dyn Clock>,
    metrics: Option<SharedMetrics>,
}

impl Tracker {
    pub fn new(
        config: TrackerConfig,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        metrics: Option<SharedMetrics>,
    ) -> Self {
        Tracker {
            history: RestartHistory::new(config.time_window),
            log_limiter: LogFetchLimiter::new(config.log_fetch_interval),
            config,
            notifier,
            log_source: None,
            clock,
            metrics,
        }
    }

    /// Enrich alerts with the tail of the container log
    pub fn with_log_source(mut self, log_source: Arc<dyn LogSource>) -> Self {
        self.log_source = Some(log_source);
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn history(&self) -> &RestartHistory {
        &self.history
    }

    pub fn metrics(&self) -> Option<&SharedMetrics> {
        self.metrics.as_ref()
    }

    pub fn log_collection_enabled(&self) -> bool {
        self.log_source.is_some()
    }

    /// Check every container of a pod and alert on those over the threshold
    pub async fn ingest(&self, pod: &PodSnapshot) -> IngestReport {
        info!(
            namespace = pod.namespace(),
            pod = pod.name(),
            phase = pod.phase(),
            "Pod restart check"
        );

        let mut report = IngestReport::default();
        for container in pod.containers() {
            report.containers_checked += 1;

            let restart_count = container.restart_count();
            if restart_count < self.config.restart_threshold {
                continue;
            }

            report.alerts_raised += 1;
            if self.alert(pod, container, restart_count).await {
                report.notifications_delivered += 1;
            }
        }

        if let Some(ref metrics) = self.metrics {
            metrics.set_tracked_keys(self.history.tracked_keys());
        }
        report
    }

    async fn alert(
        &self,
        pod: &PodSnapshot,
        container: &ContainerStatus,
        restart_count: u32,
    ) -> bool {
        let key = PodContainerKey::new(pod.namespace(), pod.name(), container.name());
        let sample = self.history.record(key.clone(), restart_count, self.clock.now());
        let priority = classify_priority(restart_count);

        warn!(
            key = %key,
            restart_count,
            rate = sample.rate,
            priority = %priority,
            "Container over restart threshold"
        );

        let log_snippet = self.log_snippet(&key).await;
        let message = compose_alert_message(
            &key,
            container,
            restart_count,
            sample.rate,
            log_snippet.as_deref(),
        );
        let notification = Notification::new(
            format!("ALERT: Pod Restarts - {}", self.config.cluster_name),
            message,
            priority,
        )
        .with_tags(ALERT_TAGS);

        let delivered = self.notifier.notify(&notification).await;
        if let Some(ref metrics) = self.metrics {
            metrics.record_alert(priority, delivered);
        }
        delivered
    }

    /// Fetch the log block for an alert, at most once per interval per key
    async fn log_snippet(&self, key: &PodContainerKey) -> Option<String> {
        let source = self.log_source.as_ref()?;

        if !self.log_limiter.try_claim(key, self.clock.now()) {
            debug!(key = %key, "Skipping log fetch, fetched recently");
            return None;
        }

        match source.tail(key, self.config.log_tail_lines).await {
            Ok(logs) if logs.is_empty() => None,
            Ok(logs) => Some(log_block(log_excerpt(&logs))),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to fetch container logs");
                if let Some(ref metrics) = self.metrics {
                    metrics.record_log_fetch_failure();
                }
                Some(log_block(&format!("Logs not available: {}", e)))
            }
        }
    }

    /// Send a notification confirming the delivery path works
    pub async fn send_test_notification(&self) -> bool {
        let message = format!(
            "=== RESTART TRACKER TEST ===\n\n\
             Cluster: {}\n\
             Status: Tracker running\n\
             Timestamp: {}\n\
             Threshold: {} restarts\n\
             Time Window: {} minutes\n\n\
             Tracked pods: {}",
            self.config.cluster_name,
            self.clock.now().format(TIMESTAMP_FORMAT),
            self.config.restart_threshold,
            self.config.time_window_minutes(),
            self.history.tracked_keys(),
        );
        let notification = Notification::new(
            format!("TEST - Restart Tracker - {}", self.config.cluster_name),
            message,
            Priority::Default,
        )
        .with_tags(TEST_TAGS);

        self.deliver(&notification).await
    }

    /// Announce that the tracker came up and how it is configured
    pub async fn announce_startup(&self) -> bool {
        let message = format!(
            "=== RESTART TRACKER STARTED ===\n\n\
             Cluster: {}\n\
             Service: Pod Restart Tracker started\n\
             Timestamp: {}\n\n\
             Configuration:\n\
             - Threshold: {} restarts\n\
             - Time Window: {} minutes\n\
             - Log collection: {}",
            self.config.cluster_name,
            self.clock.now().format(TIMESTAMP_FORMAT),
            self.config.restart_threshold,
            self.config.time_window_minutes(),
            if self.log_collection_enabled() {
                "Enabled"
            } else {
                "Disabled"
            },
        );
        let notification = Notification::new(
            format!("Restart Tracker STARTED - {}", self.config.cluster_name),
            message,
            Priority::Low,
        )
        .with_tags(STARTUP_TAGS);

        self.deliver(&notification).await
    }

    async fn deliver(&self, notification: &Notification) -> bool {
        let delivered = self.notifier.notify(notification).await;
        if !delivered {
            if let Some(ref metrics) = self.metrics {
                metrics.record_notification_failure();
            }
        }
        delivered
    }

    /// Drop quiet containers from the history and expired log-fetch slots
    pub fn evict_stale(&self) -> EvictionReport {
        let now = self.clock.now();
        let report = EvictionReport {
            history_keys: self.history.evict_stale(now, self.config.eviction_grace),
            log_fetch_entries: self.log_limiter.evict_expired(now),
        };

        if let Some(ref metrics) = self.metrics {
            metrics.record_eviction(report.history_keys);
            metrics.set_tracked_keys(self.history.tracked_keys());
        }
        report
    }
}

fn log_block(text: &str) -> String {
    format!("\n=== LAST LOG LINES ===\n{}\n", text)
}

/// Current waiting state and last termination of a container
pub fn describe_container_state(container: &ContainerStatus) -> String {
    let mut info = String::new();

    if let Some(waiting) = container.state.as_ref().and_then(|s| s.waiting.as_ref()) {
        let _ = writeln!(
            info,
            "Status: {}",
            waiting.reason.as_deref().unwrap_or("Waiting")
        );
        let _ = writeln!(
            info,
            "Message: {}",
            waiting.message.as_deref().unwrap_or("N/A")
        );
    }

    if let Some(terminated) = container
        .last_state
        .as_ref()
        .and_then(|s| s.terminated.as_ref())
    {
        info.push_str("\nLast termination:\n");
        let _ = writeln!(
            info,
            "Reason: {}",
            terminated.reason.as_deref().unwrap_or("Unknown")
        );
        match terminated.exit_code {
            Some(code) => {
                let _ = writeln!(info, "Exit Code: {}", code);
            }
            None => info.push_str("Exit Code: N/A\n"),
        }
        let _ = writeln!(
            info,
            "Message: {}",
            terminated.message.as_deref().unwrap_or("N/A")
        );
    }

    info
}

/// Body of a restart alert
pub fn compose_alert_message(
    key: &PodContainerKey,
    container: &ContainerStatus,
    restart_count: u32,
    rate: f64,
    log_snippet: Option<&str>,
) -> String {
    let PodContainerKey {
        namespace,
        pod_name,
        container_name,
    } = key;

    format!(
        "=== POD WITH EXCESSIVE RESTARTS ===\n\n\
         Namespace: {namespace}\n\
         Pod: {pod_name}\n\
         Container: {container_name}\n\
         Total Restarts: {restart_count}\n\
         Restart Rate: {rate:.2}/min\n\n\
         {state}\
         {logs}\
         \nRecommendations:\n\
         - Check full logs: kubectl logs -n {namespace} {pod_name} -c {container_name}\n\
         - Check events: kubectl describe pod -n {namespace} {pod_name}\n\
         - Check resources: kubectl top pod -n {namespace} {pod_name}\n",
        state = describe_container_state(container),
        logs = log_snippet.unwrap_or(""),
    )
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
