//! Age checks for measurements and cache entries.
//!
//! The same rule serves two independent thresholds: the measurement
//! staleness limit (serving decision) and the cache TTL (health decision).

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

// ---

/// True iff `now - at <= max_age`.
///
/// A timestamp in the future has a negative age and counts as fresh. A
/// `max_age` too large for a `TimeDelta` never expires anything.
pub fn is_fresh(at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    // ---
    match TimeDelta::from_std(max_age) {
        Ok(max) => now.signed_duration_since(at) <= max,
        Err(_) => true,
    }
}

/// Non-negative age of `at` relative to `now`, in fractional seconds.
pub fn age_seconds(at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    // ---
    let age = now.signed_duration_since(at);
    (age.num_milliseconds() as f64 / 1000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_zero_age_is_fresh() {
        // ---
        let now = noon();
        assert!(is_fresh(now, now, Duration::ZERO));
        assert!(is_fresh(now, now, Duration::from_secs(3600)));
    }

    #[test]
    fn test_exact_threshold_is_fresh() {
        // ---
        let now = noon();
        let at = now - TimeDelta::seconds(300);
        assert!(is_fresh(at, now, Duration::from_secs(300)));
    }

    #[test]
    fn test_one_second_past_threshold_is_stale() {
        // ---
        let now = noon();
        let at = now - TimeDelta::seconds(3601);
        assert!(!is_fresh(at, now, Duration::from_secs(3600)));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        // ---
        let now = noon();
        let at = now + TimeDelta::minutes(10);
        assert!(is_fresh(at, now, Duration::ZERO));
    }

    #[test]
    fn test_unrepresentable_max_age_never_expires() {
        // ---
        let now = noon();
        let at = now - TimeDelta::days(365 * 100);
        assert!(is_fresh(at, now, Duration::MAX));
    }

    #[test]
    fn test_age_seconds_clamps_future() {
        // ---
        let now = noon();
        assert_eq!(age_seconds(now - TimeDelta::milliseconds(1500), now), 1.5);
        assert_eq!(age_seconds(now + TimeDelta::seconds(30), now), 0.0);
    }

    proptest! {
        #[test]
        fn zero_age_fresh_for_any_max_age(secs in 0u64..10_000_000) {
            let now = noon();
            prop_assert!(is_fresh(now, now, Duration::from_secs(secs)));
        }

        #[test]
        fn past_threshold_always_stale(secs in 0u64..10_000_000) {
            let now = noon();
            let at = now - TimeDelta::seconds(secs as i64 + 1);
            prop_assert!(!is_fresh(at, now, Duration::from_secs(secs)));
        }
    }
}
