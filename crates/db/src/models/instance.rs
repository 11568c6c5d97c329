//! Row model for the `instances` table.

use chrono::NaiveDateTime;
use purger_core::instance::InstanceRecord;
use purger_core::types::DbId;
use sqlx::FromRow;

/// A row from `instances`, projected to the selection columns.
///
/// Timestamps are `timestamp without time zone` holding UTC.
#[derive(Debug, Clone, FromRow)]
pub struct InstanceRow {
    pub id: DbId,
    pub uuid: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub deleted_at: Option<NaiveDateTime>,
    pub display_name: Option<String>,
    pub cell_name: Option<String>,
}

impl From<InstanceRow> for InstanceRecord {
    fn from(row: InstanceRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            created_at: row.created_at.map(|ts| ts.and_utc()),
            deleted_at: row.deleted_at.map(|ts| ts.and_utc()),
            display_name: row.display_name,
            cell_name: row.cell_name,
        }
    }
}
