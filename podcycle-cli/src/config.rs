//! Configuration module
//!
//! Settings shared by every CLI command.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the manager's telemetry server
    pub manager_url: String,

    /// API key for the telemetry server and for run requests
    pub api_key: Option<String>,
}
