//! Background eviction of quiet containers
//!
//! Without this pass a container that stops restarting keeps its key in the
//! history forever. The sweeper runs every `EVICTION_INTERVAL_SECONDS` until
//! the shutdown signal fires.

use crate::server::ShutdownSignal;
use crate::tracker::ingest::Tracker;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Run eviction passes until shutdown
pub async fn run_eviction_sweeper(tracker: Arc<Tracker>, mut shutdown: ShutdownSignal) {
    let period = tracker.config().eviction_interval;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    info!(interval = ?period, "Eviction sweeper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = tracker.evict_stale();
                if report.history_keys > 0 || report.log_fetch_entries > 0 {
                    info!(
                        history_keys = report.history_keys,
                        log_fetch_entries = report.log_fetch_entries,
                        tracked_keys = tracker.history().tracked_keys(),
                        "Evicted stale entries"
                    );
                } else {
                    debug!("Eviction pass found nothing to drop");
                }
            }
            _ = shutdown.wait() => {
                info!("Eviction sweeper stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::notifier::MockNotifier;
    use crate::server::shutdown_channel;
    use crate::tracker::clock::MockClock;
    use crate::tracker::event::PodSnapshot;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_sweeper_evicts_and_stops_on_shutdown() {
        let clock = Arc::new(MockClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ));
        let config = TrackerConfig {
            eviction_interval: std::time::Duration::from_millis(10),
            ..TrackerConfig::default()
        };
        let tracker = Arc::new(Tracker::new(
            config,
            Arc::new(MockNotifier::new()),
            clock.clone(),
            None,
        ));
        let pod: PodSnapshot = serde_json::from_value(json!({
            "metadata": {"name": "api-7f", "namespace": "prod"},
            "status": {"containerStatuses": [{"name": "app", "restartCount": 9}]}
        }))
        .unwrap();
        tracker.ingest(&pod).await;
        clock.advance(Duration::hours(3));

        let (controller, signal) = shutdown_channel();
        let handle = tokio::spawn(run_eviction_sweeper(tracker.clone(), signal));

        let mut evicted = false;
        for _ in 0..50 {
            if tracker.history().tracked_keys() == 0 {
                evicted = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(evicted, "sweeper should drop the quiet container");

        controller.shutdown();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "sweeper should exit after shutdown");
    }
}
