//! The purge run: select, verify, delete, commit, report.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::TryStreamExt;
use purger_core::outcome::{PurgeReport, StepFailure};
use purger_core::schema::INSTANCES;
use purger_db::store::PurgeStore;

use crate::committer::BatchCommitter;
use crate::deleter;
use crate::error::PurgeError;
use crate::reporter::{AuditLog, RunReporter};
use crate::selector::{self, CandidateSource};
use crate::verifier::{self, Eligibility};

/// Instances purged per transaction unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// What to purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeRequest {
    pub source: CandidateSource,
    pub cell: Option<String>,
}

/// How to purge.
#[derive(Debug, Clone)]
pub struct PurgeOptions {
    /// Instances per transaction.
    pub batch_size: usize,
    /// Stop taking new candidates once the run has lasted this long.
    pub timeout: Option<Duration>,
    /// Select, verify, and report without deleting or committing.
    pub dry_run: bool,
    /// Directory receiving the date-mode audit file.
    pub audit_dir: PathBuf,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: None,
            dry_run: false,
            audit_dir: PathBuf::from("."),
        }
    }
}

/// Runs purges against one store.
pub struct Purger<'s> {
    store: &'s dyn PurgeStore,
    options: PurgeOptions,
}

impl<'s> Purger<'s> {
    pub fn new(store: &'s dyn PurgeStore, options: PurgeOptions) -> Self {
        Self { store, options }
    }

    /// Execute one run.
    ///
    /// Candidates are processed strictly one after another. Per-table
    /// failures and ineligible candidates are recorded in the report; only
    /// selection, audit, and commit failures abort the run.
    pub async fn run(&self, request: &PurgeRequest) -> Result<PurgeReport, PurgeError> {
        let started = Instant::now();
        let options = &self.options;
        tracing::info!(
            source = ?request.source,
            cell = ?request.cell,
            dry_run = options.dry_run,
            batch_size = options.batch_size,
            "Purge run starting"
        );

        let mut candidates =
            selector::select(self.store, &request.source, request.cell.as_deref()).await?;

        let audit = match request.source {
            CandidateSource::ByDate { .. } => Some(AuditLog::new(&options.audit_dir, Utc::now())),
            CandidateSource::ByFile { .. } => None,
        };
        let mut reporter = RunReporter::new(options.dry_run, audit);
        let mut committer = BatchCommitter::new(self.store, options.batch_size);
        let mut timed_out = false;

        while let Some(record) = candidates.try_next().await? {
            if options.timeout.is_some_and(|limit| started.elapsed() >= limit) {
                tracing::warn!(
                    elapsed_secs = started.elapsed().as_secs(),
                    "Run timeout reached, not taking further candidates"
                );
                timed_out = true;
                break;
            }

            reporter.candidate(&record).await?;

            let uuid = match verifier::verify(self.store, &record).await {
                Ok(Eligibility::Eligible(uuid)) => uuid,
                Ok(Eligibility::MissingUuid | Eligibility::NotSoftDeleted) => {
                    reporter.skipped();
                    continue;
                }
                Err(e) => {
                    let key = record.uuid.clone().unwrap_or_default();
                    tracing::error!(uuid = %key, error = %e, "Eligibility check failed, skipping");
                    reporter.failure(StepFailure {
                        table: INSTANCES.table,
                        key,
                        cause: e.to_string(),
                    });
                    reporter.skipped();
                    continue;
                }
            };

            if options.dry_run {
                tracing::info!(uuid, "Dry run, would purge instance");
                continue;
            }

            let tx = committer.transaction().await?;
            let purge = deleter::purge_instance(tx, uuid).await;
            reporter.purged(purge);
            committer.record_purge().await?;
        }
        drop(candidates);

        let batches = committer.finish().await?;
        if let Some(path) = reporter.audit_path() {
            tracing::info!(path = %path.display(), "Audit file complete");
        }
        let report = reporter.finish(batches, timed_out);

        tracing::info!(
            filtered = report.counters.filtered,
            deleted = report.counters.deleted,
            skipped = report.counters.skipped,
            failures = report.failures.len(),
            batches = report.batches_committed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Purge run finished"
        );
        Ok(report)
    }
}
