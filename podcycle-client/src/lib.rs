//! Podcycle HTTP Clients
//!
//! Typed HTTP clients used by the pod lifecycle manager and the operator CLI:
//! - [`PodClient`] talks to a running pod (`/status`, `/run`)
//! - [`TelemetryClient`] reads the manager's telemetry server (`/stats`)
//!
//! # Example
//!
//! ```no_run
//! use podcycle_client::TelemetryClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), podcycle_client::ClientError> {
//!     let client = TelemetryClient::new("http://localhost:8080", Some("secret".to_string()));
//!     let stats = client.stats().await?;
//!     println!("pods running: {}", stats.pods_running);
//!     Ok(())
//! }
//! ```

pub mod error;
mod pod;
mod telemetry;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use pod::{PodClient, RetryPolicy};
pub use telemetry::TelemetryClient;

use reqwest::StatusCode;

/// Joins a base URL and a path segment without doubling slashes
fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Reads the body of a response that must carry HTTP 200
///
/// Any other status becomes [`ClientError::ApiError`] carrying the
/// canonical reason phrase.
async fn expect_ok(response: reqwest::Response) -> Result<String> {
    let status = response.status();

    if status != StatusCode::OK {
        let reason = status.canonical_reason().unwrap_or("Unknown status");
        return Err(ClientError::api_error(status.as_u16(), reason));
    }

    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        assert_eq!(endpoint("http://pod:8080", "status"), "http://pod:8080/status");
        assert_eq!(endpoint("http://pod:8080/", "run"), "http://pod:8080/run");
    }
}
