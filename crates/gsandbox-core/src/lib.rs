//! Core helpers shared by the gsandbox crates: tracing setup and date formatting.

pub mod time;
pub mod tracing;

pub use time::{DEFAULT_DATE_FORMAT, TimeError, format_header_date, now_millis, resolve_timezone};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

/// Re-exported so dependents can name timezones without a direct dependency.
pub use chrono_tz::Tz;
