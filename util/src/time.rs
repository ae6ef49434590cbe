//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Returns true if a sample taken at `sample_time_s` is older than `timeout_s` at `now_s`.
///
/// Samples stamped in the future (clock skew between the sensor and the cycle clock) are not
/// considered stale. Non-finite timestamps are always stale.
pub fn is_stale(sample_time_s: f64, now_s: f64, timeout_s: f64) -> bool {
    if !sample_time_s.is_finite() || !now_s.is_finite() {
        return true;
    }

    now_s - sample_time_s > timeout_s
}
