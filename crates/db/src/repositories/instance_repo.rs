//! Repository for the `instances` table and its id mapping.

use futures::stream::BoxStream;
use purger_core::schema::{INSTANCES, INSTANCE_ID_MAPPINGS};
use purger_core::types::Timestamp;
use sqlx::{PgConnection, PgPool};

use crate::models::instance::InstanceRow;

/// Soft-deleted instances removed before `$1`, optionally restricted to the
/// cell in `$2`.
const SELECT_DELETED_BEFORE: &str = "\
    SELECT id, uuid, created_at, deleted_at, display_name, cell_name \
    FROM instances \
    WHERE deleted_at < $1 \
      AND deleted <> 0 \
      AND ($2::text IS NULL OR cell_name = $2)";

/// Provides the instance-level queries of a purge.
pub struct InstanceRepo;

impl InstanceRepo {
    /// Stream soft-deleted instances whose `deleted_at` is before `cutoff`.
    ///
    /// Rows are yielded as the server returns them; no ordering is implied.
    pub fn stream_deleted_before<'a>(
        pool: &'a PgPool,
        cutoff: Timestamp,
        cell: Option<&'a str>,
    ) -> BoxStream<'a, Result<InstanceRow, sqlx::Error>> {
        sqlx::query_as::<_, InstanceRow>(SELECT_DELETED_BEFORE)
            .bind(cutoff.naive_utc())
            .bind(cell)
            .fetch(pool)
    }

    /// Count rows for `uuid` that still carry the soft-delete marker.
    pub async fn count_soft_deleted(pool: &PgPool, uuid: &str) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM instances WHERE uuid = $1 AND deleted <> 0")
                .bind(uuid)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }

    /// Hard-delete the instance row. Returns the number of rows removed.
    pub async fn delete_by_uuid(conn: &mut PgConnection, uuid: &str) -> Result<u64, sqlx::Error> {
        let query = format!(
            "DELETE FROM {} WHERE {} = $1",
            INSTANCES.table, INSTANCES.key_column
        );
        let result = sqlx::query(&query).bind(uuid).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    /// Hard-delete the id-mapping row of an instance.
    pub async fn delete_id_mapping(
        conn: &mut PgConnection,
        uuid: &str,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "DELETE FROM {} WHERE {} = $1",
            INSTANCE_ID_MAPPINGS.table, INSTANCE_ID_MAPPINGS.key_column
        );
        let result = sqlx::query(&query).bind(uuid).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}
