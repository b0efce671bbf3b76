//! Pod API client
//!
//! Calls the two endpoints every pod exposes: `GET /status` to check
//! readiness and `POST /run` to start a pipeline run.

use std::time::Duration;

use podcycle_core::dto::pod::{PodStatus, RunRequest, RunResponse};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::{endpoint, expect_ok};

/// Bounded retry policy for transport failures
///
/// Only failures to send the request (connect errors, timeouts) are retried.
/// A response with an error status is a definitive answer and is never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Cap for the exponentially growing delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that sends each request exactly once
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// HTTP client for a pod's control endpoints
#[derive(Debug, Clone)]
pub struct PodClient {
    client: Client,
    retry: RetryPolicy,
}

impl PodClient {
    /// Creates a client with reqwest defaults and the default retry policy
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Creates a client whose every request is bounded by `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Creates a client around a preconfigured reqwest client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy used by [`PodClient::trigger_run`]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[cfg(test)]
    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetches the pod's current status
    ///
    /// # Arguments
    /// * `pod_url` - Base URL of the pod
    pub async fn status(&self, pod_url: &str) -> Result<PodStatus> {
        let url = endpoint(pod_url, "status");
        debug!("Requesting pod status from {}", url);

        let response = self.client.get(&url).send().await?;
        let body = expect_ok(response).await?;

        serde_json::from_str(&body)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Asks the pod to start a pipeline run
    ///
    /// Transport failures are retried according to the retry policy. The
    /// response must be HTTP 200 with a JSON body carrying a boolean
    /// `success` field; anything else is an error.
    ///
    /// # Arguments
    /// * `pod_url` - Base URL of the pod
    /// * `request` - Run parameters forwarded to the pod
    pub async fn trigger_run(&self, pod_url: &str, request: &RunRequest) -> Result<RunResponse> {
        let url = endpoint(pod_url, "run");
        debug!("Triggering pipeline run at {}", url);

        let response = self
            .send_with_retry(|| self.client.post(&url).json(request))
            .await?;
        let body = expect_ok(response).await?;

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))?;

        serde_json::from_value(value.clone())
            .map_err(|_| ClientError::UnexpectedResponse(value.to_string()))
    }

    /// Sends a request, retrying transport failures with exponential backoff
    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        let mut delay = self.retry.initial_delay;

        loop {
            attempt += 1;

            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt >= max_attempts => {
                    if attempt == 1 {
                        return Err(ClientError::RequestFailed(e));
                    }
                    return Err(ClientError::RetriesExhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt, max_attempts, e
                    );
                    warn!("Retrying in {:?}...", delay);

                    tokio::time::sleep(delay).await;

                    // Exponential backoff with cap
                    delay = (delay * 2).min(self.retry.max_delay);
                }
            }
        }
    }
}

impl Default for PodClient {
    fn default() -> Self {
        Self::new()
    }
}
