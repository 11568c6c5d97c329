//! Run counters, failure aggregation, and the date-mode audit file.

use std::path::{Path, PathBuf};

use purger_core::instance::InstanceRecord;
use purger_core::outcome::{PurgeReport, StepFailure, StepOutcome};
use purger_core::types::Timestamp;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::deleter::InstancePurge;
use crate::error::PurgeError;

/// Name of the audit file for a run started at `started_at`.
pub fn audit_file_name(started_at: Timestamp) -> String {
    format!("purge-{}.csv", started_at.format("%Y%m%dT%H%M%S%.6fZ"))
}

/// Append-only record of every candidate a date run selected, in replay
/// file format. The file is created on the first append.
pub struct AuditLog {
    path: PathBuf,
    file: Option<File>,
}

impl AuditLog {
    pub fn new(dir: &Path, started_at: Timestamp) -> Self {
        Self {
            path: dir.join(audit_file_name(started_at)),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one selection line and flush it to disk.
    pub async fn append(&mut self, record: &InstanceRecord) -> Result<(), PurgeError> {
        let audit_err = |source| PurgeError::Audit {
            path: self.path.clone(),
            source,
        };

        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(audit_err)?;
            tracing::info!(path = %self.path.display(), "Writing audit file");
            self.file = Some(file);
        }

        if let Some(file) = self.file.as_mut() {
            let line = format!("{record}\n");
            file.write_all(line.as_bytes()).await.map_err(audit_err)?;
            file.flush().await.map_err(audit_err)?;
        }
        Ok(())
    }
}

/// Accumulates the report of one run.
pub struct RunReporter {
    report: PurgeReport,
    audit: Option<AuditLog>,
}

impl RunReporter {
    pub fn new(dry_run: bool, audit: Option<AuditLog>) -> Self {
        Self {
            report: PurgeReport {
                dry_run,
                ..Default::default()
            },
            audit,
        }
    }

    /// Count a candidate and, in date mode, append it to the audit file.
    pub async fn candidate(&mut self, record: &InstanceRecord) -> Result<(), PurgeError> {
        self.report.counters.filtered += 1;
        if let Some(audit) = self.audit.as_mut() {
            audit.append(record).await?;
        }
        Ok(())
    }

    pub fn skipped(&mut self) {
        self.report.counters.skipped += 1;
    }

    pub fn failure(&mut self, failure: StepFailure) {
        self.report.failures.push(failure);
    }

    /// Fold the outcomes of one instance into the report.
    pub fn purged(&mut self, purge: InstancePurge) {
        if purge.instance_removed() {
            self.report.counters.deleted += 1;
        }
        for outcome in purge.outcomes {
            match outcome {
                StepOutcome::Deleted { table, rows } => {
                    *self.report.rows_by_table.entry(table).or_default() += rows;
                }
                StepOutcome::Failed(failure) => self.report.failures.push(failure),
            }
        }
    }

    /// Path of the audit file, once at least one line has been written.
    pub fn audit_path(&self) -> Option<&Path> {
        self.audit
            .as_ref()
            .filter(|audit| audit.file.is_some())
            .map(AuditLog::path)
    }

    pub fn finish(mut self, batches_committed: u64, timed_out: bool) -> PurgeReport {
        self.report.batches_committed = batches_committed;
        self.report.timed_out = timed_out;
        self.report
    }
}
