//! PostgreSQL access for the instance purger.
//!
//! Repositories are zero-sized structs with async methods; reads take
//! `&PgPool`, deletes take the connection of the running batch
//! transaction. [`store::PgPurgeStore`] wires them behind the
//! [`store::PurgeStore`] seam the orchestrator works against.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod schema_check;
pub mod store;

pub type DbPool = sqlx::PgPool;

/// Date-mode selection streams on one connection while the batch
/// transaction holds another.
const MAX_CONNECTIONS: u32 = 4;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to prove the connection works.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
