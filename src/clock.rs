//! Time source for diagnostic timestamps and the status memo.

use chrono::{DateTime, Duration, Utc};

/// Wall-clock source; injected so tests can pin "now".
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Time elapsed since `earlier`, clamped at zero.
    fn since(&self, earlier: DateTime<Utc>) -> Duration {
        (self.now_utc() - earlier).max(Duration::zero())
    }
}

/// Real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// Starts at a fixed instant and only moves when [`advance`](Self::advance)
/// is called, so successive diagnostics get predictable timestamps.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Clock pinned at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    /// Clock pinned at an RFC 3339 instant. Panics on bad input.
    pub fn from_rfc3339(s: &str) -> Self {
        let parsed = DateTime::parse_from_rfc3339(s)
            .unwrap_or_else(|e| panic!("bad RFC 3339 instant {:?}: {}", s, e));
        Self::new(parsed.with_timezone(&Utc))
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_moves_only_when_advanced() {
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        let start = clock.now_utc();
        assert_eq!(clock.now_utc(), start);

        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-01-15T13:30:00+00:00");
        assert_eq!(clock.since(start), Duration::minutes(90));
    }

    #[test]
    fn since_never_goes_negative() {
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        let later = clock.now_utc() + Duration::hours(1);
        assert_eq!(clock.since(later), Duration::zero());
    }

    #[test]
    fn system_clock_is_after_mock_epoch() {
        let fixed = MockClock::from_rfc3339("2025-01-01T00:00:00Z").now_utc();
        assert!(SystemClock.since(fixed) > Duration::zero());
    }
}
