//! Failure classification for specialist calls.
//!
//! | Error marker                   | Class     | Action                |
//! |--------------------------------|-----------|-----------------------|
//! | rate-limit / throttled         | transient | retry with backoff    |
//! | transport / timeout / deadline | transient | retry with backoff    |
//! | validation / bad-input         | permanent | fail step, fail job   |
//! | internal / unknown             | permanent | fail step, fail job   |

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

const TRANSIENT_MARKERS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "rate_limit",
    "ratelimit",
    "throttl",
    "too many requests",
    "429",
    "timeout",
    "timed out",
    "deadline",
    "transport",
    "connection",
    "unavailable",
    "502",
    "503",
    "504",
];

/// Classify an error marker string. Anything not recognizably transient is
/// permanent; this is the only success predicate the orchestrator applies.
pub fn classify_marker(marker: &str) -> ErrorClass {
    let lowered = marker.to_lowercase();
    if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Permanent
    }
}
