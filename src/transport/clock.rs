//! Microsecond clock and timeout checks.
//!
//! Frame timestamps are microseconds since the Unix epoch, which also seeds
//! the initial send sequence number.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_micros() as i64
}

/// True iff `timestamp + timeout` lies before `now`.
pub fn expired(timestamp: i64, timeout: Duration, now: i64) -> bool {
    timestamp + (timeout.as_micros() as i64) < now
}
