use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use tabload::config::{AppConfig, CliArgs};
use tabload::error::LoadError;
use tabload::ingest::{self, LoadSummary};
use tabload::util::logging::{debug_enabled, init_tracing, render_error};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    match execute(&args).await {
        Ok(summary) => {
            info!(
                "Loaded {} rows ({} columns) into {}",
                summary.rows,
                summary.columns.len(),
                summary.table
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = ?e.kind(), "{}", render_error(&e, debug_enabled()));
            ExitCode::FAILURE
        }
    }
}

async fn execute(args: &CliArgs) -> Result<LoadSummary, LoadError> {
    let config = AppConfig::new(args)?;
    let plan = config.plan()?;

    info!(
        "Loading {:?} into table {} of {}",
        plan.source, plan.table, plan.address
    );
    ingest::run(plan).await
}
