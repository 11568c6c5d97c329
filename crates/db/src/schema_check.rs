//! Startup check that the connected schema has every table and column the
//! purge relies on.

use std::collections::HashSet;

use purger_core::schema::required_columns;
use sqlx::PgPool;

/// Return `table.column` for every required column the current schema
/// lacks. An empty vec means the schema matches.
pub async fn missing_columns(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let present: HashSet<(String, String)> = sqlx::query_as::<_, (String, String)>(
        "SELECT table_name::text, column_name::text \
         FROM information_schema.columns \
         WHERE table_schema = current_schema()",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    let missing = required_columns()
        .into_iter()
        .filter(|(table, column)| !present.contains(&(table.to_string(), column.to_string())))
        .map(|(table, column)| format!("{table}.{column}"))
        .collect();
    Ok(missing)
}
