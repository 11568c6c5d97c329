//! Instance selection records and their line format.
//!
//! A selection record is the six-field tuple a purge run works from. Date
//! runs write one line per candidate to the audit file; replay runs read the
//! same format back:
//!
//! ```text
//! id,uuid,created_at,deleted_at,display_name,cell_name
//! ```
//!
//! Absent values are written as the literal token `NULL`, so a name or cell
//! that is literally `NULL` reads back as absent. `display_name` may contain
//! commas; the other fields may not.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Token used for absent values in selection lines.
pub const NULL_TOKEN: &str = "NULL";

/// Number of comma-separated fields in a selection line.
pub const FIELD_COUNT: usize = 6;

/// Timestamp layout used in selection lines (UTC, no offset).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A soft-deleted instance considered by a purge run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceRecord {
    pub id: DbId,
    pub uuid: Option<String>,
    pub created_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
    pub display_name: Option<String>,
    pub cell_name: Option<String>,
}

impl InstanceRecord {
    /// Whether this record belongs to `cell`. `None` matches everything.
    pub fn in_cell(&self, cell: Option<&str>) -> bool {
        match cell {
            None => true,
            Some(cell) => self.cell_name.as_deref() == Some(cell),
        }
    }

    /// Parse one selection line. `line_number` is 1-based and only used for
    /// error reporting.
    pub fn parse_line(line: &str, line_number: usize) -> Result<Self, CoreError> {
        let format_err = |reason: String| CoreError::SelectionFormat {
            line: line_number,
            reason,
        };

        let line = line.trim_end_matches(['\r', '\n']);
        let field_count_err = || {
            format_err(format!(
                "expected {FIELD_COUNT} fields, found {}",
                line.split(',').count()
            ))
        };

        // Display names are free text and may contain commas: the four
        // leading fields and the trailing cell are split off, the rest is
        // the name.
        let mut head = line.splitn(FIELD_COUNT - 1, ',');
        let (Some(id), Some(uuid), Some(created_at), Some(deleted_at), Some(rest)) = (
            head.next(),
            head.next(),
            head.next(),
            head.next(),
            head.next(),
        ) else {
            return Err(field_count_err());
        };
        let Some((display_name, cell_name)) = rest.rsplit_once(',') else {
            return Err(field_count_err());
        };

        let id = id
            .trim()
            .parse::<DbId>()
            .map_err(|e| format_err(format!("invalid id {id:?}: {e}")))?;
        let created_at = parse_timestamp(created_at).map_err(format_err)?;
        let deleted_at = parse_timestamp(deleted_at).map_err(format_err)?;

        Ok(Self {
            id,
            uuid: parse_text(uuid),
            created_at,
            deleted_at,
            display_name: parse_text(display_name),
            cell_name: parse_text(cell_name),
        })
    }
}

impl fmt::Display for InstanceRecord {
    /// Render as a selection line, without the trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.id,
            self.uuid.as_deref().unwrap_or(NULL_TOKEN),
            render_timestamp(self.created_at.as_ref()),
            render_timestamp(self.deleted_at.as_ref()),
            self.display_name.as_deref().unwrap_or(NULL_TOKEN),
            self.cell_name.as_deref().unwrap_or(NULL_TOKEN),
        )
    }
}

fn parse_text(field: &str) -> Option<String> {
    if field == NULL_TOKEN {
        None
    } else {
        Some(field.to_string())
    }
}

fn parse_timestamp(field: &str) -> Result<Option<Timestamp>, String> {
    if field == NULL_TOKEN {
        return Ok(None);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(field, TIMESTAMP_FORMAT) {
        return Ok(Some(naive.and_utc()));
    }
    DateTime::parse_from_rfc3339(field)
        .map(|ts| Some(ts.to_utc()))
        .map_err(|_| format!("invalid timestamp {field:?}"))
}

fn render_timestamp(ts: Option<&Timestamp>) -> String {
    match ts {
        Some(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        None => NULL_TOKEN.to_string(),
    }
}
