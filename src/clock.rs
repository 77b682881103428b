//! Wall-clock source shared by the limiter and the bot gate.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of "now". Injected so window arithmetic can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `now - lookback`, floored at the earliest representable instant.
pub fn checked_cutoff(now: DateTime<Utc>, lookback: std::time::Duration) -> DateTime<Utc> {
    Duration::from_std(lookback)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Seconds since the Unix epoch with sub-second precision.
pub fn epoch_secs(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_floors_at_earliest_instant() {
        let now = Utc::now();
        assert_eq!(
            checked_cutoff(now, std::time::Duration::from_secs(60)),
            now - Duration::seconds(60)
        );
        assert_eq!(
            checked_cutoff(now, std::time::Duration::from_secs(10_000_000_000_000)),
            DateTime::<Utc>::MIN_UTC
        );
        assert_eq!(checked_cutoff(now, std::time::Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
