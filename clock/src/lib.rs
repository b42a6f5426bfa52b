//! Time functionality for logdex: an injectable [`TimeProvider`] so that age- and
//! cold-threshold logic in the chunk manager can be exercised deterministically in tests.
#![warn(missing_docs, missing_debug_implementations)]

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, SystemTime},
};

/// A point in time, stored as nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(i64);

impl Time {
    /// Construct a `Time` from a nanosecond timestamp.
    pub fn from_timestamp_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Construct a `Time` from a second timestamp.
    pub fn from_timestamp_secs(secs: i64) -> Self {
        Self(secs * 1_000_000_000)
    }

    /// Nanoseconds since the Unix epoch.
    pub fn timestamp_nanos(&self) -> i64 {
        self.0
    }

    /// Seconds since the Unix epoch, truncating any sub-second remainder.
    pub fn timestamp_secs(&self) -> i64 {
        self.0 / 1_000_000_000
    }

    /// The duration elapsed since `earlier`, or `None` if `earlier` is in the future.
    pub fn checked_duration_since(&self, earlier: Self) -> Option<Duration> {
        let delta = self.0.checked_sub(earlier.0)?;
        if delta < 0 {
            None
        } else {
            Some(Duration::from_nanos(delta as u64))
        }
    }

    /// This time plus `duration`.
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        i64::try_from(duration.as_nanos())
            .ok()
            .and_then(|d| self.0.checked_add(d))
            .map(Self)
    }

    /// Render as an RFC 3339 string, mostly for logging.
    pub fn to_rfc3339(&self) -> String {
        self.as_date_time().to_rfc3339()
    }

    fn as_date_time(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.0)
    }
}

/// A source of the current time, injected everywhere `SystemTime::now()` would otherwise be
/// called directly so tests can control the clock.
pub trait TimeProvider: Debug + Send + Sync + 'static {
    /// The current time.
    fn now(&self) -> Time;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider {}

impl SystemProvider {
    /// Create a new provider backed by [`SystemTime::now`].
    pub fn new() -> Self {
        Self {}
    }
}

impl TimeProvider for SystemProvider {
    fn now(&self) -> Time {
        let since_epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before Unix epoch");
        Time::from_timestamp_nanos(since_epoch.as_nanos() as i64)
    }
}

/// A controllable clock for deterministic tests.
#[derive(Debug)]
pub struct MockProvider {
    now: Mutex<Time>,
}

impl MockProvider {
    /// Create a mock clock starting at `start`.
    pub fn new(start: Time) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Advance the clock by `duration`.
    pub fn inc(&self, duration: Duration) -> Time {
        let mut now = self.now.lock();
        *now = now.checked_add(duration).expect("mock clock overflow");
        *now
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, time: Time) {
        *self.now.lock() = time;
    }
}

impl TimeProvider for MockProvider {
    fn now(&self) -> Time {
        *self.now.lock()
    }
}

/// Convenience alias used at call sites that just need a shared, dynamically dispatched clock.
pub type TimeProviderRef = Arc<dyn TimeProvider>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_advances_monotonically() {
        let clock = MockProvider::new(Time::from_timestamp_nanos(0));
        assert_eq!(clock.now(), Time::from_timestamp_nanos(0));
        clock.inc(Duration::from_secs(5));
        assert_eq!(clock.now(), Time::from_timestamp_nanos(5_000_000_000));
    }

    #[test]
    fn checked_duration_since_rejects_future_earlier() {
        let now = Time::from_timestamp_nanos(100);
        let later = Time::from_timestamp_nanos(200);
        assert_eq!(later.checked_duration_since(now), Some(Duration::from_nanos(100)));
        assert_eq!(now.checked_duration_since(later), None);
    }
}
