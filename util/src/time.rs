//! General time utility functions

use chrono::{DateTime, Utc};

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Age of the given timestamp relative to now, in seconds.
///
/// Timestamps from the future give a negative age.
pub fn age_seconds(stamp: &DateTime<Utc>) -> f64 {
    duration_to_seconds(Utc::now() - *stamp).unwrap_or(std::f64::NAN)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(duration_to_seconds(chrono::Duration::milliseconds(1500)), Some(1.5));
        assert_eq!(duration_to_seconds(chrono::Duration::zero()), Some(0.0));
    }

    #[test]
    fn test_age_seconds() {
        let stamp = Utc::now() - chrono::Duration::seconds(2);
        let age = age_seconds(&stamp);
        assert!(age >= 2.0 && age < 3.0);
    }
}
