//! Pod command handlers
//!
//! Talks to a pod's own HTTP interface, bypassing the manager: check its
//! status or start a pipeline run with the same payload the manager sends.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use podcycle_client::{PodClient, RetryPolicy};
use podcycle_core::dto::pod::RunRequest;

use crate::config::Config;

/// Pod subcommands
#[derive(Subcommand)]
pub enum PodCommands {
    /// Show the pod's reported status
    Status {
        /// Base URL of the pod
        url: String,
    },
    /// Trigger a pipeline run on the pod
    Run {
        /// Base URL of the pod
        url: String,

        /// Transcription domain to process
        #[arg(long, env = "TRANSCRIPTION_DOMAIN")]
        domain: String,

        /// Maximum number of items to fetch
        #[arg(long, default_value_t = 1000)]
        limit: u32,

        /// Maximum number of items processed concurrently
        #[arg(long, default_value_t = 2)]
        processing_limit: u32,

        /// URL the pod posts its logs to (defaults to the manager's /logs)
        #[arg(long)]
        callback_url: Option<String>,
    },
}

/// Handle pod commands
///
/// # Arguments
/// * `command` - The pod command to execute
/// * `config` - The CLI configuration
pub async fn handle_pod_command(command: PodCommands, config: &Config) -> Result<()> {
    // An operator sees failures immediately; no retries
    let client = PodClient::new().with_retry(RetryPolicy::none());

    match command {
        PodCommands::Status { url } => show_status(&client, &url).await,
        PodCommands::Run {
            url,
            domain,
            limit,
            processing_limit,
            callback_url,
        } => {
            let Some(api_key) = config.api_key.clone() else {
                bail!("An API key is required to trigger a run (--api-key or TRANSCRIPTION_API_KEY)");
            };
            let callback_url = callback_url
                .unwrap_or_else(|| format!("{}/logs", config.manager_url.trim_end_matches('/')));

            let request = RunRequest {
                api_key,
                domain,
                limit,
                processing_limit,
                callback_url,
            };
            trigger_run(&client, &url, &request).await
        }
    }
}

async fn show_status(client: &PodClient, url: &str) -> Result<()> {
    let status = client
        .status(url)
        .await
        .with_context(|| format!("Failed to get status of {}", url))?;

    let label = if status.is_idle() {
        status.status.green()
    } else {
        status.status.yellow()
    };
    println!("  {} {}  {}", "▸".cyan(), url.bold(), label);

    Ok(())
}

async fn trigger_run(client: &PodClient, url: &str, request: &RunRequest) -> Result<()> {
    let response = client
        .trigger_run(url, request)
        .await
        .with_context(|| format!("Failed to trigger a run on {}", url))?;

    if !response.success {
        bail!("Pod refused the run: {}", response.detail());
    }

    println!("{} {}", "✓".green(), format!("Run started on {}", url).bold());
    println!("    {}", response.detail().dimmed());

    Ok(())
}
