use std::path::PathBuf;

use purger_core::error::CoreError;

/// Errors that abort a purge run.
///
/// Per-table delete failures never surface here; they are collected as
/// [`purger_core::outcome::StepFailure`]s in the run report.
#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    /// Argument validation or replay-file format error.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema mismatch, missing columns: {}", .0.join(", "))]
    Schema(Vec<String>),

    #[error("Cannot read replay file {path}: {source}")]
    ReplayFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write audit file {path}: {source}")]
    Audit {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience alias for purge results.
pub type PurgeResult<T> = Result<T, PurgeError>;

impl PurgeError {
    /// Process exit code: `2` for anything the operator must fix before a
    /// run can start, `1` for failures during the run.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Core(_) | Self::Config(_) | Self::Schema(_) | Self::ReplayFile { .. } => 2,
            Self::Audit { .. } | Self::Database(_) => 1,
        }
    }
}
