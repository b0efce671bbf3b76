//! Manager configuration
//!
//! Command-line flags (each with an environment variable fallback) and the
//! validated configuration built from them: credentials for the pod, the
//! telemetry listener, the provisioner invocation and every cycle timing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use podcycle_core::domain::pod::POD_ID_PLACEHOLDER;
use podcycle_core::dto::pod::RunRequest;
use reqwest::Url;

pub const DEFAULT_REST_HOST: &str = "127.0.0.1";
pub const DEFAULT_REST_PORT: u16 = 8080;
pub const DEFAULT_LIMIT: u32 = 1000;
pub const DEFAULT_PROCESSING_LIMIT: u32 = 2;
pub const DEFAULT_POD_URL_TEMPLATE: &str = "https://{pod_id}-8080.proxy.runpod.net";
pub const DEFAULT_PROVISIONER_COMMAND: &str = "runpod-singleton";
pub const DEFAULT_PROVISIONER_CONFIG: &str = "runpod-singleton/transcription-pipeline.config.yaml";

/// Command-line arguments of the manager
#[derive(Parser, Debug, Clone)]
#[command(name = "podcycle-manager")]
#[command(about = "Runs the hourly transcription pod cycle", long_about = None)]
pub struct Args {
    /// API key forwarded to the pod
    #[arg(long, env = "TRANSCRIPTION_API_KEY")]
    pub api_key: Option<String>,

    /// Transcription domain used for REST operations
    #[arg(long, env = "TRANSCRIPTION_DOMAIN")]
    pub domain: Option<String>,

    /// Maximum number of items a run fetches
    #[arg(long, env = "TRANSCRIPTION_LIMIT", default_value_t = DEFAULT_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: u32,

    /// Maximum number of items a run processes concurrently
    #[arg(long, env = "TRANSCRIPTION_PROCESSING_LIMIT", default_value_t = DEFAULT_PROCESSING_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub processing_limit: u32,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Host the telemetry server binds to
    #[arg(long, env = "PODCYCLE_REST_HOST", default_value = DEFAULT_REST_HOST)]
    pub rest_host: String,

    /// Port the telemetry server binds to
    #[arg(long, env = "PODCYCLE_REST_PORT", default_value_t = DEFAULT_REST_PORT)]
    pub rest_port: u16,

    /// API key required by the telemetry server (defaults to --api-key)
    #[arg(long, env = "PODCYCLE_TELEMETRY_API_KEY")]
    pub telemetry_api_key: Option<String>,

    /// URL the pod posts its logs to (defaults to this manager's /logs)
    #[arg(long, env = "PODCYCLE_CALLBACK_URL")]
    pub callback_url: Option<String>,

    /// Pod base URL, with {pod_id} replaced by the provisioned pod's id
    #[arg(long, env = "PODCYCLE_POD_URL_TEMPLATE", default_value = DEFAULT_POD_URL_TEMPLATE)]
    pub pod_url_template: String,

    /// Provisioning command that starts, terminates and counts pods
    #[arg(long, env = "PODCYCLE_PROVISIONER_COMMAND", default_value = DEFAULT_PROVISIONER_COMMAND)]
    pub provisioner_command: String,

    /// Configuration file handed to the provisioning command
    #[arg(long, env = "PODCYCLE_PROVISIONER_CONFIG", default_value = DEFAULT_PROVISIONER_CONFIG)]
    pub provisioner_config: PathBuf,

    /// Seconds between cycle starts
    #[arg(long, env = "PODCYCLE_CYCLE_DURATION", default_value_t = 3600)]
    pub cycle_duration: u64,

    /// Seconds to wait for the pod to report idle
    #[arg(long, env = "PODCYCLE_IDLE_WAIT_TIMEOUT", default_value_t = 300)]
    pub idle_wait_timeout: u64,

    /// Seconds between pod status checks while waiting for idle
    #[arg(long, env = "PODCYCLE_IDLE_CHECK_INTERVAL", default_value_t = 5)]
    pub idle_check_interval: u64,

    /// Seconds between pod count refreshes
    #[arg(long, env = "PODCYCLE_COUNT_UPDATE_INTERVAL", default_value_t = 60)]
    pub count_update_interval: u64,

    /// Seconds between loop ticks
    #[arg(long, env = "PODCYCLE_TICK_INTERVAL", default_value_t = 1)]
    pub tick_interval: u64,

    /// Timeout in seconds for each HTTP request to the pod
    #[arg(long, env = "PODCYCLE_POD_REQUEST_TIMEOUT", default_value_t = 15)]
    pub pod_request_timeout: u64,

    /// Timeout in seconds for each provisioner invocation
    #[arg(long, env = "PODCYCLE_PROVISIONER_TIMEOUT", default_value_t = 600)]
    pub provisioner_timeout: u64,
}

/// Timing knobs of the cycle state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTimings {
    /// Length of one cycle; elapsing it forces a new cycle
    pub cycle_duration: Duration,

    /// How long the pod may take to report idle
    pub idle_wait_timeout: Duration,

    /// Minimum spacing between two idle checks
    pub idle_check_interval: Duration,

    /// Minimum spacing between two count refreshes
    pub count_update_interval: Duration,

    /// Sleep between loop iterations
    pub tick_interval: Duration,
}

impl Default for CycleTimings {
    fn default() -> Self {
        Self {
            cycle_duration: Duration::from_secs(3600),
            idle_wait_timeout: Duration::from_secs(300),
            idle_check_interval: Duration::from_secs(5),
            count_update_interval: Duration::from_secs(60),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// How the provisioning command is invoked
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub command: String,
    pub config_path: PathBuf,
    pub timeout: Duration,
}

/// Validated manager configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub domain: String,
    pub limit: u32,
    pub processing_limit: u32,

    /// Telemetry listener
    pub rest_host: String,
    pub rest_port: u16,
    pub telemetry_api_key: Option<String>,

    /// Logs callback handed to the pod with every run
    pub callback_url: String,

    pub pod_url_template: String,
    pub pod_request_timeout: Duration,
    pub provisioner: ProvisionerConfig,
    pub timings: CycleTimings,
}

impl Config {
    /// Builds the configuration from parsed arguments
    ///
    /// The API key and domain have no defaults: they must come from the
    /// command line or the environment.
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let (Some(api_key), Some(domain)) = (non_empty(args.api_key), non_empty(args.domain))
        else {
            bail!(
                "API key and domain must be provided either via CLI arguments or environment variables."
            );
        };

        let telemetry_api_key = non_empty(args.telemetry_api_key).or_else(|| Some(api_key.clone()));

        let callback_url = match non_empty(args.callback_url) {
            Some(url) => url,
            None => default_callback_url(
                &args.rest_host,
                args.rest_port,
                telemetry_api_key.as_deref(),
            )?,
        };

        Ok(Self {
            api_key,
            domain,
            limit: args.limit,
            processing_limit: args.processing_limit,
            rest_host: args.rest_host,
            rest_port: args.rest_port,
            telemetry_api_key,
            callback_url,
            pod_url_template: args.pod_url_template,
            pod_request_timeout: Duration::from_secs(args.pod_request_timeout),
            provisioner: ProvisionerConfig {
                command: args.provisioner_command,
                config_path: args.provisioner_config,
                timeout: Duration::from_secs(args.provisioner_timeout),
            },
            timings: CycleTimings {
                cycle_duration: Duration::from_secs(args.cycle_duration),
                idle_wait_timeout: Duration::from_secs(args.idle_wait_timeout),
                idle_check_interval: Duration::from_secs(args.idle_check_interval),
                count_update_interval: Duration::from_secs(args.count_update_interval),
                tick_interval: Duration::from_secs(args.tick_interval),
            },
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("api_key cannot be empty");
        }

        if self.domain.trim().is_empty() {
            bail!("domain cannot be empty");
        }

        if !self.pod_url_template.contains(POD_ID_PLACEHOLDER) {
            bail!("pod_url_template must contain {}", POD_ID_PLACEHOLDER);
        }

        if !self.pod_url_template.starts_with("http://")
            && !self.pod_url_template.starts_with("https://")
        {
            bail!("pod_url_template must start with http:// or https://");
        }

        let callback = Url::parse(&self.callback_url).context("callback_url is not a valid URL")?;
        if callback.scheme() != "http" && callback.scheme() != "https" {
            bail!("callback_url must use http or https");
        }

        if self.provisioner.command.trim().is_empty() {
            bail!("provisioner command cannot be empty");
        }

        let timings = &self.timings;
        for (name, value) in [
            ("cycle_duration", timings.cycle_duration),
            ("idle_wait_timeout", timings.idle_wait_timeout),
            ("idle_check_interval", timings.idle_check_interval),
            ("count_update_interval", timings.count_update_interval),
            ("tick_interval", timings.tick_interval),
            ("pod_request_timeout", self.pod_request_timeout),
            ("provisioner_timeout", self.provisioner.timeout),
        ] {
            if value.is_zero() {
                bail!("{} must be greater than 0", name);
            }
        }

        if timings.idle_wait_timeout >= timings.cycle_duration {
            bail!("idle_wait_timeout must be shorter than cycle_duration");
        }

        Ok(())
    }

    /// Payload sent to the pod when triggering a run
    pub fn run_request(&self) -> RunRequest {
        RunRequest {
            api_key: self.api_key.clone(),
            domain: self.domain.clone(),
            limit: self.limit,
            processing_limit: self.processing_limit,
            callback_url: self.callback_url.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `/logs` URL of this manager's telemetry server, carrying its API key
fn default_callback_url(host: &str, port: u16, api_key: Option<&str>) -> anyhow::Result<String> {
    let mut url = Url::parse(&format!("http://{}:{}/logs", host, port))
        .context("Failed to build the default callback URL")?;
    if let Some(key) = api_key {
        url.query_pairs_mut().append_pair("api_key", key);
    }
    Ok(url.to_string())
}
