//! Per-step outcomes and the end-of-run report.

use std::collections::BTreeMap;

use serde::Serialize;

/// Result of one delete statement for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Deleted { table: &'static str, rows: u64 },
    Failed(StepFailure),
}

impl StepOutcome {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Deleted { table, .. } => table,
            Self::Failed(failure) => failure.table,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A delete that failed. `key` is the value matched on: the instance uuid,
/// or the action id for event rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub table: &'static str,
    pub key: String,
    pub cause: String,
}

/// Counters kept for the lifetime of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    /// Candidates taken from the selector.
    pub filtered: u64,
    /// Candidates whose instance row was removed.
    pub deleted: u64,
    /// Candidates that failed eligibility verification.
    pub skipped: u64,
}

/// Report returned after a purge run completes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PurgeReport {
    pub counters: RunCounters,
    pub failures: Vec<StepFailure>,
    pub rows_by_table: BTreeMap<&'static str, u64>,
    pub batches_committed: u64,
    pub dry_run: bool,
    pub timed_out: bool,
}

impl PurgeReport {
    /// The two summary lines printed at the end of every run.
    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!("Instances filtered: {}", self.counters.filtered),
            format!("Instances deleted : {}", self.counters.deleted),
        ]
    }
}
