//! Time helpers for deadlines and retry pacing.

use chrono::{DateTime, Duration, Utc};

/// A timestamp with timezone (always UTC for the coordinator).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert a caller-supplied time limit in milliseconds into an absolute
/// deadline. Zero means no deadline.
pub fn deadline_from_millis(time_limit_ms: u64) -> Option<Timestamp> {
    if time_limit_ms == 0 {
        None
    } else {
        Some(now() + Duration::milliseconds(time_limit_ms as i64))
    }
}

/// Check if a deadline has passed.
pub fn is_expired(deadline: Timestamp) -> bool {
    now() > deadline
}

/// Remaining time until a deadline, as a std duration. Zero if already
/// passed.
pub fn remaining_std(deadline: Timestamp) -> std::time::Duration {
    (deadline - now()).to_std().unwrap_or(std::time::Duration::ZERO)
}
