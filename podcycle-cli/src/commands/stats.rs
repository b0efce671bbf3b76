//! Stats command handler
//!
//! Prints the counters published by the manager's telemetry server.

use anyhow::{Context, Result};
use colored::*;
use podcycle_client::TelemetryClient;

use crate::config::Config;

/// Fetch and print the manager's stats
pub async fn show_stats(config: &Config) -> Result<()> {
    let client = TelemetryClient::new(&config.manager_url, config.api_key.clone());
    let stats = client
        .stats()
        .await
        .with_context(|| format!("Failed to fetch stats from {}", client.base_url()))?;

    println!("{}", format!("Stats from {}", client.base_url()).bold());
    println!();
    println!("  Pods total:     {}", stats.pods_total.to_string().cyan());
    println!("  Pods running:   {}", colorize_running(stats.pods_running));
    println!(
        "  Last run:       {}",
        format_timestamp(stats.pipeline_last_run_time)
    );

    Ok(())
}

fn colorize_running(running: u64) -> ColoredString {
    if running > 0 {
        running.to_string().green()
    } else {
        running.to_string().yellow()
    }
}

/// Renders a unix timestamp, 0 meaning no run yet
fn format_timestamp(timestamp: i64) -> ColoredString {
    if timestamp == 0 {
        return "never".dimmed();
    }

    match chrono::DateTime::from_timestamp(timestamp, 0) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S UTC").to_string().normal(),
        None => format!("invalid ({})", timestamp).red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        colored::control::set_override(false);
        assert_eq!(format_timestamp(0).to_string(), "never");
        assert_eq!(
            format_timestamp(1234567890).to_string(),
            "2009-02-13 23:31:30 UTC"
        );
        assert_eq!(
            format_timestamp(i64::MAX).to_string(),
            format!("invalid ({})", i64::MAX)
        );
    }
}
