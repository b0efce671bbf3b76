//! Podcycle CLI
//!
//! Operator tool for a running pod lifecycle manager and its pods.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "podcycle")]
#[command(about = "Inspect the pod lifecycle manager and its pods", long_about = None)]
struct Cli {
    /// Telemetry server URL of the manager
    #[arg(long, env = "PODCYCLE_MANAGER_URL", default_value = "http://127.0.0.1:8080")]
    manager_url: String,

    /// API key for the telemetry server and pod runs
    #[arg(long, env = "TRANSCRIPTION_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        manager_url: cli.manager_url,
        api_key: cli.api_key.filter(|key| !key.is_empty()),
    };

    handle_command(cli.command, &config).await
}
