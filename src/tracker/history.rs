//! In-memory restart history with a sliding time window
//!
//! One `RestartHistory` is owned by the tracker for the lifetime of the
//! process. All mutation goes through a single mutex; the lock is never held
//! across an `.await`.

use crate::tracker::analyzer::restart_rate;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Identifies a tracked container
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodContainerKey {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
}

impl PodContainerKey {
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
        }
    }
}

impl fmt::Display for PodContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.namespace, self.pod_name, self.container_name
        )
    }
}

/// A single restart count seen at a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartObservation {
    pub timestamp: DateTime<Utc>,
    pub restart_count: u32,
}

/// Result of recording an observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// Observations left in the window after pruning
    pub retained: usize,
    /// Observations per minute across the window
    pub rate: f64,
}

/// Diagnostic view of one key, served by `/stats`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyStats {
    pub total_events: usize,
    pub last_restart_count: u32,
    pub last_seen: String,
}

#[derive(Debug)]
struct KeyHistory {
    observations: VecDeque<RestartObservation>,
    last_recorded: DateTime<Utc>,
}

impl KeyHistory {
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self
            .observations
            .front()
            .is_some_and(|o| o.timestamp < cutoff)
        {
            self.observations.pop_front();
        }
    }

    fn rate(&mut self) -> f64 {
        restart_rate(self.observations.make_contiguous())
    }
}

/// Process-wide restart history keyed by container
#[derive(Debug)]
pub struct RestartHistory {
    window: Duration,
    entries: Mutex<HashMap<PodContainerKey, KeyHistory>>,
}

impl RestartHistory {
    /// Create an empty history retaining observations for `window`
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PodContainerKey, KeyHistory>> {
        // Every mutation is a single push or pop, so a poisoned map is still consistent
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an observation, prune the window and read the rate
    ///
    /// The three steps happen under one lock acquisition so concurrent
    /// ingests for the same key cannot interleave prune and append.
    pub fn record(
        &self,
        key: PodContainerKey,
        restart_count: u32,
        now: DateTime<Utc>,
    ) -> RateSample {
        let cutoff = now - self.window;
        let mut entries = self.lock();
        let history = entries.entry(key).or_insert_with(|| KeyHistory {
            observations: VecDeque::new(),
            last_recorded: now,
        });

        history.observations.push_back(RestartObservation {
            timestamp: now,
            restart_count,
        });
        history.last_recorded = now;
        history.prune(cutoff);

        RateSample {
            retained: history.observations.len(),
            rate: history.rate(),
        }
    }

    /// Current rate for a key, after dropping observations outside the window
    pub fn rate(&self, key: &PodContainerKey, now: DateTime<Utc>) -> f64 {
        let cutoff = now - self.window;
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(history) => {
                history.prune(cutoff);
                history.rate()
            }
            None => 0.0,
        }
    }

    /// Copy of the retained observations for a key (oldest first)
    pub fn observations(&self, key: &PodContainerKey) -> Vec<RestartObservation> {
        self.lock()
            .get(key)
            .map(|h| h.observations.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of keys in the map, including keys whose window is empty
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Per-key summary for keys that still hold observations
    pub fn snapshot(&self) -> BTreeMap<String, KeyStats> {
        self.lock()
            .iter()
            .filter_map(|(key, history)| {
                let last = history.observations.back()?;
                Some((
                    key.to_string(),
                    KeyStats {
                        total_events: history.observations.len(),
                        last_restart_count: last.restart_count,
                        last_seen: last.timestamp.to_rfc3339(),
                    },
                ))
            })
            .collect()
    }

    /// Prune every key and drop the ones that went quiet
    ///
    /// A key is removed once its window is empty and nothing was recorded
    /// for longer than `window + grace`. Returns the number of removed keys.
    pub fn evict_stale(&self, now: DateTime<Utc>, grace: Duration) -> usize {
        let cutoff = now - self.window;
        let stale_before = cutoff - grace;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, history| {
            history.prune(cutoff);
            !history.observations.is_empty() || history.last_recorded >= stale_before
        });
        before - entries.len()
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
