//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert whole seconds to a chrono duration
pub fn secs(seconds: u64) -> Duration {
    let clamped = seconds.min((i64::MAX / 1000) as u64);
    Duration::seconds(clamped as i64)
}

/// `at` minus `seconds`, saturating at the earliest representable instant
pub fn seconds_before(at: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    at.checked_sub_signed(secs(seconds))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Whole seconds, rounded up, needed to cover `remaining`
///
/// Negative or zero durations yield 0.
pub fn ceil_secs(remaining: Duration) -> u64 {
    let millis = remaining.num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis as u64).div_ceil(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_secs_conversion() {
        assert_eq!(secs(0), Duration::zero());
        assert_eq!(secs(60).num_milliseconds(), 60_000);
    }

    #[test]
    fn test_secs_saturates_on_huge_values() {
        // Must not panic on out-of-range input
        let d = secs(u64::MAX);
        assert!(d > Duration::zero());
    }

    #[test]
    fn test_seconds_before_saturates() {
        let at = now();
        assert_eq!((at - seconds_before(at, 90)).num_seconds(), 90);
        assert_eq!(seconds_before(at, u64::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(Duration::milliseconds(1)), 1);
        assert_eq!(ceil_secs(Duration::milliseconds(1000)), 1);
        assert_eq!(ceil_secs(Duration::milliseconds(1001)), 2);
        assert_eq!(ceil_secs(Duration::seconds(59)), 59);
    }

    #[test]
    fn test_ceil_secs_non_positive() {
        assert_eq!(ceil_secs(Duration::zero()), 0);
        assert_eq!(ceil_secs(Duration::milliseconds(-500)), 0);
    }
}
