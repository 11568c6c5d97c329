//! Repository for rows that reference an instance.

use purger_core::schema::{DependentTable, INSTANCE_ACTIONS_EVENTS};
use purger_core::types::DbId;
use sqlx::PgConnection;

/// Provides deletes for dependent tables. Every statement runs on the
/// caller's connection so it joins the batch transaction.
pub struct DependentRepo;

impl DependentRepo {
    /// Ids of every action recorded for an instance.
    pub async fn action_ids(conn: &mut PgConnection, uuid: &str) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM instance_actions WHERE instance_uuid = $1 ORDER BY id",
        )
        .bind(uuid)
        .fetch_all(&mut *conn)
        .await
    }

    /// Delete the event rows owned by one action.
    pub async fn delete_events_for_action(
        conn: &mut PgConnection,
        action_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "DELETE FROM {} WHERE {} = $1",
            INSTANCE_ACTIONS_EVENTS.table, INSTANCE_ACTIONS_EVENTS.key_column
        );
        let result = sqlx::query(&query)
            .bind(action_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every row of `table` that references `uuid`.
    pub async fn delete_for_instance(
        conn: &mut PgConnection,
        table: DependentTable,
        uuid: &str,
    ) -> Result<u64, sqlx::Error> {
        let descriptor = table.descriptor();
        let query = format!(
            "DELETE FROM {} WHERE {} = $1",
            descriptor.table, descriptor.key_column
        );
        let result = sqlx::query(&query).bind(uuid).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}
