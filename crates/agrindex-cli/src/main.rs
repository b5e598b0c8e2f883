//! Agrindex CLI - Command-line interface
//!
//! Runs the field index pipeline for one trigger against the real
//! collaborators (STAC catalog, HTTP band hosting, S3, SNS, Step Functions).

mod cli;
mod commands;
mod config_loader;
mod errors;
mod output;

use clap::Parser;
use cli::Cli;
use errors::CliError;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Create async runtime and execute the command
    let result = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(commands::execute(cli)));

    if let Err(err) = result {
        match err.downcast_ref::<CliError>() {
            Some(cli_err) => cli_err.display(),
            None => CliError::new(format!("{:#}", err)).display(),
        }
        std::process::exit(1);
    }
}
