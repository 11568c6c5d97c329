//! Parsing of the `--date` purge cutoff.
//!
//! Accepted forms, all interpreted as UTC unless they carry an offset:
//!
//! - `2015-01-01`
//! - `2015-01-01 12:30`, `2015-01-01 12:30:45`, `2015-01-01 12:30:45.5`
//! - `2015-01-01T12:30:45`
//! - RFC 3339, e.g. `2015-01-01T12:30:45+01:00`

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::CoreError;
use crate::types::Timestamp;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse a cutoff string into a UTC timestamp.
pub fn parse_cutoff(input: &str) -> Result<Timestamp, CoreError> {
    let input = input.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.to_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(CoreError::Validation(format!(
        "unrecognised date {input:?}, expected e.g. 2015-01-01 or 2015-01-01 12:00:00"
    )))
}
