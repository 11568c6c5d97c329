//! `purger` -- hard-delete soft-deleted compute instances.
//!
//! Selects instances by deletion cutoff (`--date`) or from a replay file
//! (`--file`), re-verifies each one, and removes it together with every
//! dependent row in batched transactions.
//!
//! # Environment variables
//!
//! | Variable       | Required            | Description                          |
//! |----------------|---------------------|--------------------------------------|
//! | `DATABASE_URL` | without `--config`  | PostgreSQL connection string         |
//! | `RUST_LOG`     | no                  | Log filter, default `purger=info`    |
//!
//! Exit status is `0` when the run completes, `1` when it aborts on a
//! database or audit-file error, and `2` on configuration or argument
//! errors.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use purger::cli::Cli;
use purger::config::DatabaseConfig;
use purger::error::PurgeError;
use purger::orchestrator::Purger;
use purger_core::outcome::PurgeReport;
use purger_db::store::PgPurgeStore;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "purger=info,purger_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(report) => {
            print_report(&report, cli.json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Purge aborted");
            eprintln!("ERROR: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<PurgeReport, PurgeError> {
    // --- Arguments ---
    let request = cli.request()?;
    let options = cli.options()?;

    // --- Configuration ---
    let db_config = DatabaseConfig::load(cli.config.as_deref())?;

    // --- Database ---
    let pool = purger_db::create_pool(&db_config.url).await?;
    tracing::info!("Database connection pool created");

    purger_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    let missing = purger_db::schema_check::missing_columns(&pool).await?;
    if !missing.is_empty() {
        return Err(PurgeError::Schema(missing));
    }
    tracing::info!("Database schema verified");

    // --- Purge ---
    let store = PgPurgeStore::new(pool);
    let report = Purger::new(&store, options).run(&request).await?;

    store.pool().close().await;
    Ok(report)
}

fn print_report(report: &PurgeReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(body) => {
                println!("{body}");
                return;
            }
            Err(e) => tracing::warn!(error = %e, "Cannot render report as JSON"),
        }
    }

    for line in report.summary_lines() {
        println!("{line}");
    }
    if !report.failures.is_empty() {
        println!("Failed deletes    : {}", report.failures.len());
    }
    if report.timed_out {
        println!("Run stopped early : timeout reached");
    }
}
