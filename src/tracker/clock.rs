//! Clock abstraction for the restart window
//!
//! Production code uses `SystemClock` which delegates to `chrono::Utc::now()`.
//! Tests use `MockClock` to step through restart scenarios minute by minute.

use chrono::{DateTime, Utc};

/// Trait for getting the current time
///
/// Injected into the `Tracker` so window pruning and log-fetch throttling
/// can be driven deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to `chrono::Utc::now()`
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with controllable time
#[cfg(test)]
#[allow(clippy::expect_used)]
pub struct MockClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("MockClock lock poisoned") = now;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().expect("MockClock lock poisoned");
        *now += duration;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("MockClock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_returns_time() {
        let now = SystemClock.now();
        // After 2020-01-01
        assert!(now.timestamp() > 1_577_836_800);
    }

    #[test]
    fn test_mock_clock_advance_by_minutes() {
        let start = Utc::now();
        let clock = MockClock::new(start);
        clock.advance(chrono::Duration::minutes(5));
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(10));
    }

    #[test]
    fn test_mock_clock_set_overrides_time() {
        let start = Utc::now();
        let clock = MockClock::new(start);
        let later = start + chrono::Duration::hours(2);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
