//! Command-line interface.
//!
//! Flags can also come from the environment:
//!
//! | Variable             | Flag             | Default |
//! |----------------------|------------------|---------|
//! | `PURGE_CONFIG`       | `--config`       | --      |
//! | `PURGE_BATCH_SIZE`   | `--batch-size`   | `1000`  |
//! | `PURGE_TIMEOUT_SECS` | `--timeout-secs` | none    |
//! | `PURGE_AUDIT_DIR`    | `--audit-dir`    | `.`     |

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use purger_core::cutoff::parse_cutoff;
use purger_core::error::CoreError;

use crate::error::PurgeError;
use crate::orchestrator::{PurgeOptions, PurgeRequest, DEFAULT_BATCH_SIZE};
use crate::selector::CandidateSource;

#[derive(Debug, Parser)]
#[command(name = "purger")]
#[command(about = "Hard-delete soft-deleted instances and every row that references them")]
#[command(version)]
pub struct Cli {
    /// Purge instances deleted before this date (e.g. 2015-01-01).
    #[arg(long)]
    pub date: Option<String>,

    /// Purge the instances listed in a replay file from an earlier run.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Only purge instances that belong to this cell.
    #[arg(long)]
    pub cell: Option<String>,

    /// Select and verify, but delete nothing.
    #[arg(long = "dry-run", alias = "dryrun", default_value_t = false)]
    pub dry_run: bool,

    /// INI file (nova.conf) with a `[database] connection` entry. Without it,
    /// DATABASE_URL is used.
    #[arg(long, env = "PURGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Instances purged per transaction.
    #[arg(long, env = "PURGE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Stop taking new candidates after this many seconds.
    #[arg(long, env = "PURGE_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Directory for the audit file written by date runs.
    #[arg(long, env = "PURGE_AUDIT_DIR", default_value = ".")]
    pub audit_dir: PathBuf,

    /// Print the run report as JSON instead of the summary lines.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl Cli {
    /// Validate the selection flags into a request.
    ///
    /// Exactly one of `--date` and `--file` is required. The date must parse
    /// and the replay file must be readable; every failure here is fatal.
    pub fn request(&self) -> Result<PurgeRequest, PurgeError> {
        let source = match (&self.date, &self.file) {
            (Some(_), Some(_)) => {
                return Err(CoreError::Validation(
                    "--date and --file cannot be used together".into(),
                )
                .into())
            }
            (None, None) => {
                return Err(
                    CoreError::Validation("either --date or --file is required".into()).into(),
                )
            }
            (Some(date), None) => CandidateSource::ByDate {
                cutoff: parse_cutoff(date)?,
            },
            (None, Some(path)) => {
                std::fs::File::open(path).map_err(|source| PurgeError::ReplayFile {
                    path: path.clone(),
                    source,
                })?;
                CandidateSource::ByFile { path: path.clone() }
            }
        };

        let cell = self.cell.clone().filter(|cell| !cell.is_empty());
        Ok(PurgeRequest { source, cell })
    }

    /// Run options from the remaining flags.
    pub fn options(&self) -> Result<PurgeOptions, PurgeError> {
        if self.batch_size == 0 {
            return Err(CoreError::Validation("--batch-size must be at least 1".into()).into());
        }
        Ok(PurgeOptions {
            batch_size: self.batch_size,
            timeout: self.timeout_secs.map(Duration::from_secs),
            dry_run: self.dry_run,
            audit_dir: self.audit_dir.clone(),
        })
    }
}
