//! Date formatting for API timestamps.
//!
//! The Gmail `Date` header is an RFC 2822 string; it is rendered in a single
//! human-readable form, in an IANA timezone chosen by the caller.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::debug;

/// Default rendering, e.g. `January 5, 2024 03:04:05 PM`.
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y %I:%M:%S %p";

/// Errors produced while resolving timezones.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    /// The timezone name is not a known IANA identifier.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Resolves the timezone used for rendering dates.
///
/// An explicit name must be a valid IANA identifier. Without one, the `TZ`
/// environment variable is consulted, then the system's local zone, and UTC
/// is the final fallback.
pub fn resolve_timezone(name: Option<&str>) -> Result<Tz, TimeError> {
    if let Some(name) = name {
        return name
            .parse::<Tz>()
            .map_err(|_| TimeError::UnknownTimezone(name.to_string()));
    }

    let system = iana_time_zone::get_timezone()
        .inspect_err(|e| debug!("cannot determine system timezone: {}", e))
        .ok();
    Ok(first_known_zone([std::env::var("TZ").ok(), system]))
}

/// Returns the first candidate that names a known zone, or UTC.
fn first_known_zone(candidates: [Option<String>; 2]) -> Tz {
    candidates
        .into_iter()
        .flatten()
        .find_map(|name| name.trim_start_matches(':').parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

/// Returns the current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Formats an RFC 2822 `Date` header in the given timezone.
///
/// Mail servers often append a comment such as `(UTC)`; it is ignored.
/// Values that do not parse are returned unchanged.
pub fn format_header_date(value: &str, tz: &Tz) -> String {
    let trimmed = value.trim();
    let without_comment = match trimmed.find(" (") {
        Some(idx) if trimmed.ends_with(')') => &trimmed[..idx],
        _ => trimmed,
    };

    match DateTime::parse_from_rfc2822(without_comment) {
        Ok(dt) => dt.with_timezone(tz).format(DEFAULT_DATE_FORMAT).to_string(),
        Err(_) => trimmed.to_string(),
    }
}
