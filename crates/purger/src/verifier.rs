//! Per-instance eligibility check run before any delete.

use purger_core::instance::InstanceRecord;
use purger_db::store::PurgeStore;

/// Verdict for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility<'r> {
    /// Still soft-deleted; safe to purge by this uuid.
    Eligible(&'r str),
    /// The candidate carries no uuid, so nothing can be matched.
    MissingUuid,
    /// Not found, or restored since it was selected.
    NotSoftDeleted,
}

/// Re-check a candidate against the live database.
///
/// Candidates may be stale (replay files, or a restore between selection
/// and purge), so this runs for every candidate in every mode.
pub async fn verify<'r>(
    store: &dyn PurgeStore,
    record: &'r InstanceRecord,
) -> Result<Eligibility<'r>, sqlx::Error> {
    let Some(uuid) = record.uuid.as_deref() else {
        tracing::warn!(id = record.id, "Candidate has no uuid, skipping");
        return Ok(Eligibility::MissingUuid);
    };

    if store.is_soft_deleted(uuid).await? {
        Ok(Eligibility::Eligible(uuid))
    } else {
        tracing::warn!(uuid, "Instance not found or not deleted, skipping");
        Ok(Eligibility::NotSoftDeleted)
    }
}
