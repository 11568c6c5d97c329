//! The storage seam of a purge run.
//!
//! [`PurgeStore`] covers the reads (selection, eligibility) and opens batch
//! transactions; [`PurgeTx`] covers the deletes inside one batch. The
//! orchestrator only sees these traits, so the whole pipeline runs against
//! an in-memory store in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use purger_core::instance::InstanceRecord;
use purger_core::schema::DependentTable;
use purger_core::types::{DbId, Timestamp};
use sqlx::{Acquire, PgPool, Postgres, Transaction};

use crate::repositories::{DependentRepo, InstanceRepo};

/// Read access and transaction factory for a purge run.
#[async_trait]
pub trait PurgeStore: Send + Sync {
    /// Soft-deleted instances removed before `cutoff`, optionally in `cell`.
    fn deleted_before<'a>(
        &'a self,
        cutoff: Timestamp,
        cell: Option<&'a str>,
    ) -> BoxStream<'a, Result<InstanceRecord, sqlx::Error>>;

    /// Whether `uuid` still exists with its soft-delete marker set.
    async fn is_soft_deleted(&self, uuid: &str) -> Result<bool, sqlx::Error>;

    /// Open the transaction for the next batch.
    async fn begin(&self) -> Result<Box<dyn PurgeTx>, sqlx::Error>;
}

/// Deletes inside one batch transaction.
///
/// A failed call must leave the transaction usable for the calls that
/// follow it.
#[async_trait]
pub trait PurgeTx: Send {
    async fn action_ids(&mut self, uuid: &str) -> Result<Vec<DbId>, sqlx::Error>;

    async fn delete_action_events(&mut self, action_id: DbId) -> Result<u64, sqlx::Error>;

    async fn delete_dependent(
        &mut self,
        table: DependentTable,
        uuid: &str,
    ) -> Result<u64, sqlx::Error>;

    async fn delete_id_mapping(&mut self, uuid: &str) -> Result<u64, sqlx::Error>;

    async fn delete_instance(&mut self, uuid: &str) -> Result<u64, sqlx::Error>;

    /// Commit the batch. The transaction cannot be used afterwards.
    async fn commit(&mut self) -> Result<(), sqlx::Error>;
}

/// PostgreSQL implementation of [`PurgeStore`].
#[derive(Debug, Clone)]
pub struct PgPurgeStore {
    pool: PgPool,
}

impl PgPurgeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PurgeStore for PgPurgeStore {
    fn deleted_before<'a>(
        &'a self,
        cutoff: Timestamp,
        cell: Option<&'a str>,
    ) -> BoxStream<'a, Result<InstanceRecord, sqlx::Error>> {
        Box::pin(
            InstanceRepo::stream_deleted_before(&self.pool, cutoff, cell)
                .map_ok(InstanceRecord::from),
        )
    }

    async fn is_soft_deleted(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        Ok(InstanceRepo::count_soft_deleted(&self.pool, uuid).await? > 0)
    }

    async fn begin(&self) -> Result<Box<dyn PurgeTx>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPurgeTx { tx: Some(tx) }))
    }
}

/// One batch transaction. Every statement runs in its own savepoint so a
/// failure rolls back that statement only.
pub struct PgPurgeTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgPurgeTx {
    fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, sqlx::Error> {
        self.tx
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("batch transaction already committed".into()))
    }
}

/// Release the savepoint on success, roll it back on failure.
async fn finish_step<T>(
    savepoint: Transaction<'_, Postgres>,
    result: Result<T, sqlx::Error>,
) -> Result<T, sqlx::Error> {
    match result {
        Ok(value) => {
            savepoint.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = savepoint.rollback().await {
                tracing::warn!(error = %rollback_err, "Failed to roll back savepoint");
            }
            Err(e)
        }
    }
}

#[async_trait]
impl PurgeTx for PgPurgeTx {
    async fn action_ids(&mut self, uuid: &str) -> Result<Vec<DbId>, sqlx::Error> {
        let mut savepoint = self.transaction()?.begin().await?;
        let result = DependentRepo::action_ids(&mut savepoint, uuid).await;
        finish_step(savepoint, result).await
    }

    async fn delete_action_events(&mut self, action_id: DbId) -> Result<u64, sqlx::Error> {
        let mut savepoint = self.transaction()?.begin().await?;
        let result = DependentRepo::delete_events_for_action(&mut savepoint, action_id).await;
        finish_step(savepoint, result).await
    }

    async fn delete_dependent(
        &mut self,
        table: DependentTable,
        uuid: &str,
    ) -> Result<u64, sqlx::Error> {
        let mut savepoint = self.transaction()?.begin().await?;
        let result = DependentRepo::delete_for_instance(&mut savepoint, table, uuid).await;
        finish_step(savepoint, result).await
    }

    async fn delete_id_mapping(&mut self, uuid: &str) -> Result<u64, sqlx::Error> {
        let mut savepoint = self.transaction()?.begin().await?;
        let result = InstanceRepo::delete_id_mapping(&mut savepoint, uuid).await;
        finish_step(savepoint, result).await
    }

    async fn delete_instance(&mut self, uuid: &str) -> Result<u64, sqlx::Error> {
        let mut savepoint = self.transaction()?.begin().await?;
        let result = InstanceRepo::delete_by_uuid(&mut savepoint, uuid).await;
        finish_step(savepoint, result).await
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        match self.tx.take() {
            Some(tx) => tx.commit().await,
            None => Err(sqlx::Error::Protocol(
                "batch transaction already committed".into(),
            )),
        }
    }
}
