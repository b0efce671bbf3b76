//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod pod;
mod stats;

pub use pod::PodCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show the manager's published stats
    Stats,
    /// Talk to a pod directly
    Pod {
        #[command(subcommand)]
        command: PodCommands,
    },
}

/// Routes the command to the appropriate handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Stats => stats::show_stats(config).await,
        Commands::Pod { command } => pod::handle_pod_command(command, config).await,
    }
}
