//! Timestamp helpers shared by trace records.

use chrono::{SecondsFormat, Utc};

/// Returns the current UTC time as an RFC 3339 string with microsecond
/// precision.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
