//! Telemetry API client
//!
//! Reads the counters the pod lifecycle manager publishes on `/stats`.

use podcycle_core::domain::stats::StatsSnapshot;
use podcycle_core::dto::stats::StatsResponse;
use reqwest::Client;

use crate::error::{ClientError, Result};
use crate::endpoint;

/// HTTP client for the manager's telemetry server
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    /// Base URL of the telemetry server (e.g., "http://localhost:8080")
    base_url: String,
    /// Key sent as the `api_key` query parameter, when the server requires one
    api_key: Option<String>,
    client: Client,
}

impl TelemetryClient {
    /// Create a new telemetry client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the telemetry server
    /// * `api_key` - Key for servers started with an API key
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    /// Get the base URL of the telemetry server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current stats snapshot
    pub async fn stats(&self) -> Result<StatsSnapshot> {
        let url = endpoint(&self.base_url, "stats");
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        let body: StatsResponse = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))?;

        Ok(body.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use std::collections::HashMap;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = TelemetryClient::new("http://localhost:8080/", None);
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_stats_sends_api_key() {
        let router = Router::new().route(
            "/stats",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if params.get("api_key").map(String::as_str) != Some("secret") {
                    return Err(StatusCode::FORBIDDEN);
                }
                Ok(Json(serde_json::json!({
                    "stats": {"pods_total": 2, "pods_running": 1, "pipeline_last_run_time": 42}
                })))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let url = format!("http://{}", addr);
        let stats = TelemetryClient::new(&url, Some("secret".to_string()))
            .stats()
            .await
            .unwrap();
        assert_eq!(stats.pods_total, 2);
        assert_eq!(stats.pods_running, 1);
        assert_eq!(stats.pipeline_last_run_time, 42);

        let err = TelemetryClient::new(&url, None).stats().await.unwrap_err();
        assert!(matches!(err, ClientError::ApiError { status: 403, .. }));
    }
}
