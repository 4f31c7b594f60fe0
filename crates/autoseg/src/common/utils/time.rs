use std::time::Duration;

// Allows specifying humantime format (2h, 3m, etc.)
crate::arg_wrapper!(ArgDuration, Duration, humantime::parse_duration);

/// Formats a duration as an ISO-8601 duration with second granularity (`PT120S`).
/// Sub-second parts are dropped.
pub fn format_iso8601_seconds(duration: Duration) -> String {
    format!("PT{}S", duration.as_secs())
}

/// Formats a duration as an ISO-8601 duration with minute granularity (`PT60M`).
/// Partial minutes are rounded up, so that the remote timeout is never shorter than requested.
pub fn format_iso8601_minutes(duration: Duration) -> String {
    format!("PT{}M", whole_minutes(duration))
}

pub fn whole_minutes(duration: Duration) -> u64 {
    duration.as_secs().div_ceil(60)
}
