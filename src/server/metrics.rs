//! Prometheus metrics for the restart tracker
//!
//! All collectors live in a private registry served from `/metrics`.

use crate::notifier::Priority;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics handle shared between the HTTP server, tracker and sweeper
pub type SharedMetrics = Arc<TrackerMetrics>;

pub struct TrackerMetrics {
    registry: Registry,
    events_total: IntCounter,
    event_errors_total: IntCounter,
    alerts_total: IntCounterVec,
    notification_failures_total: IntCounter,
    log_fetch_failures_total: IntCounter,
    evicted_keys_total: IntCounter,
    tracked_keys: IntGauge,
}

/// Create the registry and register every collector
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    let registry = Registry::new();

    let events_total = IntCounter::new(
        "restart_tracker_events_total",
        "Pod events received on /pods",
    )?;
    let event_errors_total = IntCounter::new(
        "restart_tracker_event_errors_total",
        "Pod events rejected because they could not be decoded",
    )?;
    let alerts_total = IntCounterVec::new(
        Opts::new(
            "restart_tracker_alerts_total",
            "Restart alerts raised, by notification priority",
        ),
        &["priority"],
    )?;
    let notification_failures_total = IntCounter::new(
        "restart_tracker_notification_failures_total",
        "Notifications the endpoint did not accept",
    )?;
    let log_fetch_failures_total = IntCounter::new(
        "restart_tracker_log_fetch_failures_total",
        "Container log fetches that failed",
    )?;
    let evicted_keys_total = IntCounter::new(
        "restart_tracker_evicted_keys_total",
        "Containers dropped from the restart history after going quiet",
    )?;
    let tracked_keys = IntGauge::new(
        "restart_tracker_tracked_keys",
        "Containers currently held in the restart history",
    )?;

    registry.register(Box::new(events_total.clone()))?;
    registry.register(Box::new(event_errors_total.clone()))?;
    registry.register(Box::new(alerts_total.clone()))?;
    registry.register(Box::new(notification_failures_total.clone()))?;
    registry.register(Box::new(log_fetch_failures_total.clone()))?;
    registry.register(Box::new(evicted_keys_total.clone()))?;
    registry.register(Box::new(tracked_keys.clone()))?;

    Ok(Arc::new(TrackerMetrics {
        registry,
        events_total,
        event_errors_total,
        alerts_total,
        notification_failures_total,
        log_fetch_failures_total,
        evicted_keys_total,
        tracked_keys,
    }))
}

impl TrackerMetrics {
    pub fn record_event(&self) {
        self.events_total.inc();
    }

    pub fn record_event_error(&self) {
        self.event_errors_total.inc();
    }

    /// Count an alert and, if it was not delivered, a notification failure
    pub fn record_alert(&self, priority: Priority, delivered: bool) {
        self.alerts_total
            .with_label_values(&[priority.as_str()])
            .inc();
        if !delivered {
            self.notification_failures_total.inc();
        }
    }

    pub fn record_notification_failure(&self) {
        self.notification_failures_total.inc();
    }

    pub fn record_log_fetch_failure(&self) {
        self.log_fetch_failures_total.inc();
    }

    pub fn record_eviction(&self, keys: usize) {
        self.evicted_keys_total.inc_by(keys as u64);
    }

    pub fn set_tracked_keys(&self, keys: usize) {
        self.tracked_keys.set(keys as i64);
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
