//! Bounded batch transactions.

use purger_db::store::{PurgeStore, PurgeTx};

/// Groups purged instances into transactions of at most `batch_size`.
///
/// The transaction is opened lazily on the first purge of a batch, so a
/// dry run, which never asks for one, opens and commits nothing.
pub struct BatchCommitter<'s> {
    store: &'s dyn PurgeStore,
    batch_size: usize,
    tx: Option<Box<dyn PurgeTx>>,
    pending: usize,
    committed: u64,
}

impl<'s> BatchCommitter<'s> {
    pub fn new(store: &'s dyn PurgeStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            tx: None,
            pending: 0,
            committed: 0,
        }
    }

    /// Transaction of the current batch.
    pub async fn transaction(&mut self) -> Result<&mut (dyn PurgeTx + 'static), sqlx::Error> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.store.begin().await?,
        };
        Ok(self.tx.insert(tx).as_mut())
    }

    /// Count one purged instance, committing when the batch is full.
    pub async fn record_purge(&mut self) -> Result<(), sqlx::Error> {
        self.pending += 1;
        if self.pending >= self.batch_size {
            self.commit().await?;
        }
        Ok(())
    }

    /// Commit any partial batch and return the number of commits made.
    pub async fn finish(mut self) -> Result<u64, sqlx::Error> {
        self.commit().await?;
        Ok(self.committed)
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        if let Some(mut tx) = self.tx.take() {
            tx.commit().await?;
            self.committed += 1;
            tracing::debug!(
                instances = self.pending,
                batch = self.committed,
                "Committed batch"
            );
        }
        self.pending = 0;
        Ok(())
    }
}
