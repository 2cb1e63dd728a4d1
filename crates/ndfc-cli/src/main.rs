//! ndfc - Nexus Dashboard Fabric Controller client
//!
//! Prints the run's results as JSON on stdout. Exits non-zero when the
//! run fails or any task reports a failure.

use clap::Parser;
use ndfc_cli::{failed, init_logging, run, Cli};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let result = match run(&cli).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Run failed");
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&result) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: failed to render results: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if failed(&result) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
