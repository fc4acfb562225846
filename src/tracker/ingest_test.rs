//! Tests for pod event processing

use super::*;
use crate::notifier::MockNotifier;
use crate::server::create_metrics;
use crate::tracker::clock::MockClock;
use crate::tracker::logs::MockLogSource;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn test_config() -> TrackerConfig {
    TrackerConfig {
        cluster_name: "staging".to_string(),
        ..TrackerConfig::default()
    }
}

fn pod(name: &str, containers: serde_json::Value) -> PodSnapshot {
    serde_json::from_value(json!({
        "metadata": {"name": name, "namespace": "prod"},
        "status": {"phase": "Running", "containerStatuses": containers}
    }))
    .unwrap()
}

fn crashing(restart_count: i64) -> PodSnapshot {
    pod(
        "api-7f",
        json!([{
            "name": "app",
            "restartCount": restart_count,
            "state": {"waiting": {"reason": "CrashLoopBackOff", "message": "back-off 5m0s"}},
            "lastState": {"terminated": {"reason": "OOMKilled", "exitCode": 137}}
        }]),
    )
}

struct Harness {
    tracker: Tracker,
    notifier: Arc<MockNotifier>,
    clock: Arc<MockClock>,
}

fn harness() -> Harness {
    harness_with(MockNotifier::new(), None)
}

fn harness_with(notifier: MockNotifier, log_source: Option<Arc<MockLogSource>>) -> Harness {
    let notifier = Arc::new(notifier);
    let clock = Arc::new(MockClock::new(t0()));
    let mut tracker = Tracker::new(test_config(), notifier.clone(), clock.clone(), None);
    if let Some(source) = log_source {
        tracker = tracker.with_log_source(source);
    }
    Harness {
        tracker,
        notifier,
        clock,
    }
}

#[tokio::test]
async fn test_rate_over_three_observations() {
    let h = harness();

    h.tracker.ingest(&crashing(6)).await;
    h.clock.advance(Duration::minutes(5));
    h.tracker.ingest(&crashing(7)).await;
    h.clock.advance(Duration::minutes(5));
    let report = h.tracker.ingest(&crashing(8)).await;

    assert_eq!(
        report,
        IngestReport {
            containers_checked: 1,
            alerts_raised: 1,
            notifications_delivered: 1,
        }
    );

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].message.contains("Restart Rate: 0.00/min"));
    assert!(sent[2].message.contains("Restart Rate: 0.20/min"));
    assert!(sent[2].message.contains("Total Restarts: 8"));

    let key = PodContainerKey::new("prod", "api-7f", "app");
    assert_eq!(h.tracker.history().observations(&key).len(), 3);
}

#[tokio::test]
async fn test_below_threshold_is_not_recorded() {
    let h = harness();

    let report = h.tracker.ingest(&crashing(4)).await;

    assert_eq!(report.containers_checked, 1);
    assert_eq!(report.alerts_raised, 0);
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.tracker.history().tracked_keys(), 0);
}

#[tokio::test]
async fn test_threshold_is_inclusive() {
    let h = harness();

    let report = h.tracker.ingest(&crashing(5)).await;

    assert_eq!(report.alerts_raised, 1);
    assert_eq!(h.notifier.sent()[0].priority, Priority::Default);
}

#[tokio::test]
async fn test_priority_and_tags_per_container() {
    let h = harness();
    let snapshot = pod(
        "batch-1",
        json!([
            {"name": "a", "restartCount": 10},
            {"name": "b", "restartCount": 11},
            {"name": "c", "restartCount": 21},
            {"name": "d", "restartCount": 0}
        ]),
    );

    let report = h.tracker.ingest(&snapshot).await;

    assert_eq!(report.containers_checked, 4);
    assert_eq!(report.alerts_raised, 3);

    let sent = h.notifier.sent();
    let priorities: Vec<Priority> = sent.iter().map(|n| n.priority).collect();
    assert_eq!(
        priorities,
        vec![Priority::Default, Priority::High, Priority::Max]
    );
    for notification in &sent {
        assert_eq!(notification.title, "ALERT: Pod Restarts - staging");
        assert_eq!(notification.tags, vec!["warning", "rotating_light"]);
    }
}

#[tokio::test]
async fn test_pod_without_containers_is_a_no_op() {
    let h = harness();

    let report = h.tracker.ingest(&PodSnapshot::default()).await;

    assert_eq!(report, IngestReport::default());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_alert_message_describes_container_state() {
    let h = harness();

    h.tracker.ingest(&crashing(12)).await;

    let message = &h.notifier.sent()[0].message;
    assert!(message.contains("Namespace: prod"));
    assert!(message.contains("Pod: api-7f"));
    assert!(message.contains("Container: app"));
    assert!(message.contains("Status: CrashLoopBackOff"));
    assert!(message.contains("Message: back-off 5m0s"));
    assert!(message.contains("Reason: OOMKilled"));
    assert!(message.contains("Exit Code: 137"));
    assert!(message.contains("kubectl logs -n prod api-7f -c app"));
    assert!(message.contains("kubectl describe pod -n prod api-7f"));
    assert!(message.contains("kubectl top pod -n prod api-7f"));
    assert!(!message.contains("LAST LOG LINES"));
}

#[tokio::test]
async fn test_log_fetch_is_throttled_per_container() {
    let logs = Arc::new(MockLogSource::new("panic: index out of range\n"));
    let h = harness_with(MockNotifier::new(), Some(logs.clone()));

    h.tracker.ingest(&crashing(6)).await;
    h.clock.advance(Duration::seconds(10));
    h.tracker.ingest(&crashing(7)).await;
    h.clock.advance(Duration::seconds(300));
    h.tracker.ingest(&crashing(8)).await;

    assert_eq!(logs.calls(), 2);

    let sent = h.notifier.sent();
    assert!(sent[0]
        .message
        .contains("=== LAST LOG LINES ===\npanic: index out of range\n"));
    assert!(!sent[1].message.contains("LAST LOG LINES"));
    assert!(sent[2].message.contains("LAST LOG LINES"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingests_fetch_logs_once_and_keep_every_observation() {
    let logs = Arc::new(MockLogSource::new("panic: boom\n"));
    let notifier = Arc::new(MockNotifier::new());
    let clock = Arc::new(MockClock::new(t0()));
    let tracker = Arc::new(
        Tracker::new(test_config(), notifier.clone(), clock, None).with_log_source(logs.clone()),
    );

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.ingest(&crashing(6 + i)).await })
        })
        .collect();
    for handle in handles {
        let report = handle.await.unwrap();
        assert_eq!(report.alerts_raised, 1);
    }

    assert_eq!(logs.calls(), 1);
    let key = PodContainerKey::new("prod", "api-7f", "app");
    assert_eq!(tracker.history().observations(&key).len(), 16);
    assert_eq!(tracker.history().tracked_keys(), 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 16);
    let with_logs = sent
        .iter()
        .filter(|n| n.message.contains("LAST LOG LINES"))
        .count();
    assert_eq!(with_logs, 1);
}

#[tokio::test]
async fn test_log_excerpt_is_truncated() {
    let long_log = format!("{}END", "x".repeat(2_000));
    let logs = Arc::new(MockLogSource::new(&long_log));
    let h = harness_with(MockNotifier::new(), Some(logs));

    h.tracker.ingest(&crashing(6)).await;

    let message = &h.notifier.sent()[0].message;
    assert!(message.contains(&format!("{}END", "x".repeat(497))));
    assert!(!message.contains(&"x".repeat(498)));
}

#[tokio::test]
async fn test_log_fetch_failure_uses_placeholder() {
    let logs = Arc::new(MockLogSource::new_failing("pods \"api-7f\" not found"));
    let h = harness_with(MockNotifier::new(), Some(logs.clone()));

    let report = h.tracker.ingest(&crashing(6)).await;

    assert_eq!(report.notifications_delivered, 1);
    let message = &h.notifier.sent()[0].message;
    assert!(message.contains("=== LAST LOG LINES ===\nLogs not available"));
    assert!(message.contains("not found"));

    // The failed attempt still consumes the fetch slot
    h.tracker.ingest(&crashing(7)).await;
    assert_eq!(logs.calls(), 1);
}

#[tokio::test]
async fn test_empty_logs_omit_log_block() {
    let logs = Arc::new(MockLogSource::new(""));
    let h = harness_with(MockNotifier::new(), Some(logs.clone()));

    h.tracker.ingest(&crashing(6)).await;

    assert_eq!(logs.calls(), 1);
    assert!(!h.notifier.sent()[0].message.contains("LAST LOG LINES"));
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_ingest() {
    let h = harness_with(MockNotifier::failing(), None);

    let report = h.tracker.ingest(&crashing(6)).await;

    assert_eq!(report.alerts_raised, 1);
    assert_eq!(report.notifications_delivered, 0);
    assert_eq!(h.tracker.history().tracked_keys(), 1);
}

#[tokio::test]
async fn test_send_test_notification() {
    let h = harness();
    h.tracker.ingest(&crashing(6)).await;

    assert!(h.tracker.send_test_notification().await);

    let sent = h.notifier.sent();
    let test = sent.last().unwrap();
    assert_eq!(test.title, "TEST - Restart Tracker - staging");
    assert_eq!(test.priority, Priority::Default);
    assert_eq!(test.tags, vec!["bell", "white_check_mark"]);
    assert!(test.message.contains("Cluster: staging"));
    assert!(test.message.contains("Timestamp: 2025-03-01 12:00:00 UTC"));
    assert!(test.message.contains("Threshold: 5 restarts"));
    assert!(test.message.contains("Time Window: 60 minutes"));
    assert!(test.message.contains("Tracked pods: 1"));
}

#[tokio::test]
async fn test_announce_startup() {
    let h = harness();

    assert!(h.tracker.announce_startup().await);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Restart Tracker STARTED - staging");
    assert_eq!(sent[0].priority, Priority::Low);
    assert_eq!(sent[0].tags, vec!["rocket", "information_source"]);
    assert!(sent[0].message.contains("Log collection: Disabled"));

    let logs = Arc::new(MockLogSource::new("ok"));
    let h = harness_with(MockNotifier::new(), Some(logs));
    h.tracker.announce_startup().await;
    assert!(h.notifier.sent()[0].message.contains("Log collection: Enabled"));
}

#[tokio::test]
async fn test_evict_stale_drops_quiet_containers() {
    let logs = Arc::new(MockLogSource::new("line\n"));
    let h = harness_with(MockNotifier::new(), Some(logs));

    h.tracker.ingest(&crashing(6)).await;
    assert_eq!(h.tracker.evict_stale(), EvictionReport::default());

    // Window (60m) plus grace (60m) has not fully passed yet
    h.clock.advance(Duration::minutes(119));
    let report = h.tracker.evict_stale();
    assert_eq!(report.history_keys, 0);
    assert_eq!(report.log_fetch_entries, 1);
    assert_eq!(h.tracker.history().tracked_keys(), 1);
    assert!(h.tracker.history().snapshot().is_empty());

    h.clock.advance(Duration::minutes(2));
    let report = h.tracker.evict_stale();
    assert_eq!(report.history_keys, 1);
    assert_eq!(h.tracker.history().tracked_keys(), 0);
}

#[tokio::test]
async fn test_metrics_follow_ingest() {
    let metrics = create_metrics().unwrap();
    let notifier = Arc::new(MockNotifier::failing());
    let clock = Arc::new(MockClock::new(t0()));
    let tracker = Tracker::new(test_config(), notifier, clock, Some(metrics.clone()));

    tracker.ingest(&crashing(25)).await;

    let text = metrics.encode().unwrap();
    assert!(text.contains(r#"restart_tracker_alerts_total{priority="max"} 1"#));
    assert!(text.contains("restart_tracker_notification_failures_total 1"));
    assert!(text.contains("restart_tracker_tracked_keys 1"));
}

#[test]
fn test_describe_container_state_defaults() {
    let container: ContainerStatus = serde_json::from_value(json!({
        "name": "app",
        "state": {"waiting": {}},
        "lastState": {"terminated": {}}
    }))
    .unwrap();

    let info = describe_container_state(&container);

    assert_eq!(
        info,
        "Status: Waiting\nMessage: N/A\n\nLast termination:\nReason: Unknown\nExit Code: N/A\nMessage: N/A\n"
    );
}

#[test]
fn test_describe_running_container_is_empty() {
    let container: ContainerStatus = serde_json::from_value(json!({
        "name": "app",
        "state": {"running": {"startedAt": "2025-03-01T12:00:00Z"}}
    }))
    .unwrap();

    assert!(describe_container_state(&container).is_empty());
}
