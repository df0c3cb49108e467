//! Trusted time module
//!
//! The lock gate compares against time reported by a remote authority,
//! never the local clock, so changing the system time cannot open a lock
//! early. All timestamps are normalized to one fixed reference offset.

mod backoff;
mod oracle;

pub use backoff::ExponentialBackoff;
pub use oracle::{parse_time_response, HttpTimeOracle};

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset};
use parking_lot::Mutex;
use std::sync::Arc;

/// Source of trusted "now"
pub trait TimeSource {
    /// Current trusted time in the reference offset
    fn now(&self) -> Result<DateTime<FixedOffset>>;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Result<DateTime<FixedOffset>> {
        (**self).now()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn now(&self) -> Result<DateTime<FixedOffset>> {
        (**self).now()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> Result<DateTime<FixedOffset>> {
        (**self).now()
    }
}

/// Build the reference offset from minutes east of UTC
pub fn fixed_offset(minutes: i32) -> Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::InvalidConfig(format!("UTC offset out of range: {} minutes", minutes)))
}

/// Manually driven time source
///
/// Useful for tests and for embedding the lock protocol where the caller
/// already holds a trusted timestamp.
pub struct ManualClock {
    now: Mutex<Option<DateTime<FixedOffset>>>,
}

impl ManualClock {
    /// Clock reporting `now`
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        ManualClock {
            now: Mutex::new(Some(now)),
        }
    }

    /// Clock that behaves like an unreachable time authority
    pub fn unavailable() -> Self {
        ManualClock {
            now: Mutex::new(None),
        }
    }

    /// Set the reported time
    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = Some(now);
    }

    /// Move the reported time forward
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock();
        if let Some(now) = guard.as_mut() {
            *now = *now + by;
        }
    }

    /// Make subsequent queries fail
    pub fn go_offline(&self) {
        *self.now.lock() = None;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Result<DateTime<FixedOffset>> {
        let now = *self.now.lock();
        now.ok_or_else(|| Error::TimeSourceUnavailable("manual clock is offline".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_offset() {
        assert_eq!(fixed_offset(330).unwrap().local_minus_utc(), 19_800);
        assert_eq!(fixed_offset(-300).unwrap().local_minus_utc(), -18_000);
        assert!(fixed_offset(24 * 60).is_err());
        assert!(fixed_offset(i32::MAX).is_err());
    }

    #[test]
    fn test_manual_clock() {
        let start = DateTime::parse_from_rfc3339("2026-05-01T12:00:00+05:30").unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now().unwrap(), start);

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now().unwrap(), start + Duration::seconds(90));

        clock.go_offline();
        assert!(matches!(clock.now(), Err(Error::TimeSourceUnavailable(_))));

        clock.set(start);
        assert_eq!((&clock).now().unwrap(), start);
    }

    #[test]
    fn test_unavailable_clock() {
        let clock = ManualClock::unavailable();
        assert!(matches!(clock.now(), Err(Error::TimeSourceUnavailable(_))));
    }
}
