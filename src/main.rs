//! AutoML Agent - Main Entry Point
//!
//! Runs the HTTP server by default; subcommands train, predict and list
//! models from the command line.

use clap::Parser;
use automl_agent::cli::{Cli, Commands};
use automl_agent::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automl_agent=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    Commands::run(cli.command, AppConfig::default()).await
}
