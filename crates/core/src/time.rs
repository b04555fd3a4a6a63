// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use chrono::Utc;

/// Current wall-clock time in unix seconds, as stored in headers and
/// payloads.
pub fn unix_timestamp() -> u32 {
    u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX)
}

/// Maximum distance a block timestamp may lie in the future.
pub const MAX_TIMESTAMP_DRIFT_SECS: u32 = 10 * 60;

/// Whether `timestamp` is acceptable after a block stamped `prev_timestamp`
/// when the local clock reads `now`: `prev < timestamp <= now + max_drift`.
pub fn timestamp_in_band(prev_timestamp: u32, timestamp: u32, now: u32, max_drift: u32) -> bool {
    timestamp > prev_timestamp && timestamp <= now.saturating_add(max_drift)
}
