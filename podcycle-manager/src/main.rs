//! Podcycle Manager
//!
//! Runs a single ephemeral transcription pod through an hourly lifecycle:
//! start it, wait until it reports idle, trigger a pipeline run, publish pod
//! counts, and start over at the next cycle boundary.
//!
//! Architecture:
//! - Configuration: CLI flags with environment variable fallbacks
//! - Telemetry: background HTTP server exposing stats and receiving pod logs
//! - Provisioner: external command that starts, terminates and counts pods
//! - Gateway: provisioner plus pod HTTP calls, reduced to plain outcomes
//! - Cycle: the state machine polling loop
//!
//! SIGINT/SIGTERM stop the loop; active pods are then terminated and the
//! telemetry server shut down before the process exits. A second signal
//! during that cleanup exits immediately.

mod config;
mod cycle;
mod gateway;
mod panic;
mod provisioner;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use podcycle_client::PodClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Args, Config};
use crate::cycle::{CycleManager, run_supervised};
use crate::gateway::{PodGateway, PodLifecycle};
use crate::provisioner::CommandProvisioner;
use crate::telemetry::{Stats, TelemetryServer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.debug {
        "podcycle_manager=debug,podcycle_client=debug,tower_http=debug"
    } else {
        "podcycle_manager=info,podcycle_client=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Podcycle Manager");

    let config = load_config(args)?;
    info!(
        "Loaded configuration: domain={}, limit={}, processing_limit={}, provisioner={}",
        config.domain, config.limit, config.processing_limit, config.provisioner.command
    );

    // Telemetry
    let stats = Arc::new(Stats::new());
    let telemetry = Arc::new(TelemetryServer::new(
        config.rest_host.clone(),
        config.rest_port,
        config.telemetry_api_key.clone(),
        Arc::clone(&stats),
    ));
    telemetry
        .start()
        .await
        .context("Failed to start telemetry server")?;

    // Gateway
    let provisioner = Arc::new(CommandProvisioner::from_config(&config.provisioner));
    let client = PodClient::with_timeout(config.pod_request_timeout)
        .context("Failed to build pod HTTP client")?;
    let gateway: Arc<dyn PodLifecycle> = Arc::new(PodGateway::new(
        provisioner,
        client,
        Arc::clone(&telemetry),
        config.run_request(),
        config.pod_url_template.clone(),
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn(listen_for_signals(shutdown.clone()));

    let manager = CycleManager::new(
        Arc::clone(&gateway),
        Arc::clone(&telemetry),
        config.timings.clone(),
        shutdown,
    );

    info!("Starting cycle loop");
    let result = run_supervised(manager).await;

    info!("Shutting down");
    if !gateway.terminate_all().await {
        warn!("Could not terminate active pods during shutdown");
    }
    telemetry.shutdown().await;

    if let Err(e) = result {
        error!("Cycle loop aborted: {}", e);
        return Err(e).context("Cycle loop stopped on a fatal error");
    }

    info!("Podcycle Manager stopped");
    Ok(())
}

/// Builds and validates the configuration
fn load_config(args: Args) -> Result<Config> {
    let config = Config::from_args(args)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// What a received termination signal should do
#[derive(Debug, PartialEq, Eq)]
enum SignalAction {
    /// Stop the loop and clean up
    Shutdown,
    /// Cleanup is already under way; leave now
    Exit,
}

/// Cancels `shutdown` on the first signal, asks for exit on any later one
fn on_signal(shutdown: &CancellationToken) -> SignalAction {
    if shutdown.is_cancelled() {
        SignalAction::Exit
    } else {
        shutdown.cancel();
        SignalAction::Shutdown
    }
}

/// Handles SIGINT and SIGTERM for the lifetime of the process
#[cfg(unix)]
async fn listen_for_signals(shutdown: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut interrupt, mut terminate) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

    loop {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };

        match on_signal(&shutdown) {
            SignalAction::Shutdown => info!("Received {}, shutting down", name),
            SignalAction::Exit => {
                warn!("Received {} during shutdown, exiting immediately", name);
                std::process::exit(130);
            }
        }
    }
}

#[cfg(not(unix))]
async fn listen_for_signals(shutdown: CancellationToken) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        match on_signal(&shutdown) {
            SignalAction::Shutdown => info!("Received Ctrl+C, shutting down"),
            SignalAction::Exit => {
                warn!("Received Ctrl+C during shutdown, exiting immediately");
                std::process::exit(130);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_signal_shuts_down_second_exits() {
        let shutdown = CancellationToken::new();

        assert_eq!(on_signal(&shutdown), SignalAction::Shutdown);
        assert!(shutdown.is_cancelled());
        assert_eq!(on_signal(&shutdown), SignalAction::Exit);
    }

    #[test]
    fn test_signal_after_fatal_error_exits() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        assert_eq!(on_signal(&shutdown), SignalAction::Exit);
    }
}
