//! Pod DTOs
//!
//! Bodies exchanged with the pod's own HTTP interface.

use serde::{Deserialize, Serialize};

/// Status value a pod reports once it can accept a new run
pub const IDLE_STATUS: &str = "idle";

/// Response body of `GET {pod_url}/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodStatus {
    pub status: String,
}

impl PodStatus {
    pub fn is_idle(&self) -> bool {
        self.status == IDLE_STATUS
    }
}

/// Request body of `POST {pod_url}/run`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Credential the pod uses against the transcription backend
    pub api_key: String,

    /// Transcription domain the pod should process
    pub domain: String,

    /// Maximum number of items to fetch
    pub limit: u32,

    /// Maximum number of items processed concurrently
    pub processing_limit: u32,

    /// URL the pod posts its logs to
    pub callback_url: String,
}

/// Response body of `POST {pod_url}/run`
///
/// `success` is mandatory: a body without an explicit boolean is not a
/// valid acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub success: bool,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

impl RunResponse {
    /// Best available explanation for logs
    pub fn detail(&self) -> &str {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("no message")
    }
}
