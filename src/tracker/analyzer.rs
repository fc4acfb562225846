//! Restart velocity and alert priority
//!
//! The rate only looks at the oldest and newest retained observation.

use crate::notifier::Priority;
use crate::tracker::history::RestartObservation;

/// Restart count above which an alert is raised as `high`
pub const HIGH_PRIORITY_ABOVE: u32 = 10;

/// Restart count above which an alert is raised as `max`
pub const MAX_PRIORITY_ABOVE: u32 = 20;

/// Observations per minute between the first and last retained record
///
/// Returns 0 when there are fewer than two observations or when both
/// endpoints share the same instant.
pub fn restart_rate(observations: &[RestartObservation]) -> f64 {
    if observations.len() < 2 {
        return 0.0;
    }
    let first = &observations[0];
    let last = &observations[observations.len() - 1];

    let elapsed = last.timestamp - first.timestamp;
    // Microsecond precision; only spans beyond ~292k years overflow
    let elapsed_minutes = match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 60_000_000.0,
        None => elapsed.num_milliseconds() as f64 / 60_000.0,
    };
    if elapsed_minutes <= 0.0 {
        return 0.0;
    }

    (observations.len() - 1) as f64 / elapsed_minutes
}

/// Map a cumulative restart count to a notification priority
///
/// Comparisons are strict: exactly 10 restarts is still `default`,
/// exactly 20 is still `high`.
pub fn classify_priority(restart_count: u32) -> Priority {
    if restart_count > MAX_PRIORITY_ABOVE {
        Priority::Max
    } else if restart_count > HIGH_PRIORITY_ABOVE {
        Priority::High
    } else {
        Priority::Default
    }
}
