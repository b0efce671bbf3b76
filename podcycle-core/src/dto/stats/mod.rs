//! Telemetry DTOs
//!
//! Bodies served by the manager's telemetry server.

use serde::{Deserialize, Serialize};

use crate::domain::stats::StatsSnapshot;

/// Response body of `GET /stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: StatsSnapshot,
}

/// Error body returned by the telemetry server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short error category (e.g. "Forbidden")
    pub error: String,

    /// Human-readable detail, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}
