//! Candidate selection: date query or replay file.

use std::path::{Path, PathBuf};

use futures::stream::{self, BoxStream, StreamExt};
use purger_core::error::CoreError;
use purger_core::instance::InstanceRecord;
use purger_core::types::Timestamp;
use purger_db::store::PurgeStore;

use crate::error::PurgeError;

/// Where the candidates of a run come from. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// Instances soft-deleted before `cutoff`, queried live.
    ByDate { cutoff: Timestamp },
    /// Instances listed in a replay file written by an earlier date run.
    ByFile { path: PathBuf },
}

/// Candidate stream handed to the orchestrator.
pub type Candidates<'a> = BoxStream<'a, Result<InstanceRecord, sqlx::Error>>;

/// Resolve the candidates of a run.
///
/// Date mode streams straight from the database. Replay mode reads and
/// validates the whole file up front, so a malformed line fails the run
/// before the first candidate is processed.
pub async fn select<'a>(
    store: &'a dyn PurgeStore,
    source: &'a CandidateSource,
    cell: Option<&'a str>,
) -> Result<Candidates<'a>, PurgeError> {
    match source {
        CandidateSource::ByDate { cutoff } => Ok(store.deleted_before(*cutoff, cell)),
        CandidateSource::ByFile { path } => {
            let records = read_replay_file(path, cell).await?;
            tracing::info!(
                path = %path.display(),
                candidates = records.len(),
                "Loaded replay file"
            );
            Ok(stream::iter(records.into_iter().map(Ok)).boxed())
        }
    }
}

/// Read a replay file and keep the records in `cell` (all when `None`).
pub async fn read_replay_file(
    path: &Path,
    cell: Option<&str>,
) -> Result<Vec<InstanceRecord>, PurgeError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PurgeError::ReplayFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse_replay(&contents, cell)?)
}

/// Parse replay file contents. Blank lines are ignored; any other line
/// must be a well-formed selection record.
pub fn parse_replay(contents: &str, cell: Option<&str>) -> Result<Vec<InstanceRecord>, CoreError> {
    let mut records = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = InstanceRecord::parse_line(line, index + 1)?;
        if record.in_cell(cell) {
            records.push(record);
        }
    }
    Ok(records)
}
