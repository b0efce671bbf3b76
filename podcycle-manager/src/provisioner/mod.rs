//! Pod provisioning
//!
//! The provisioning backend is an external capability: it can start (or
//! confirm) the singleton pod, terminate active pods and count them. This
//! module defines that seam and a command-line backed implementation.

mod command;

pub use command::CommandProvisioner;

use async_trait::async_trait;
use podcycle_core::domain::pod::PodCounts;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors raised by a provisioning backend
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to run provisioner: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("provisioner timed out after {0:?}")]
    TimedOut(Duration),

    #[error("provisioner exited with code {exit_code}: {stderr}")]
    Failed { exit_code: i32, stderr: String },

    #[error("provisioner returned invalid output: {0}")]
    InvalidOutput(String),
}

/// Backend able to manage the singleton pod
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Starts the pod if needed and returns its identifier
    ///
    /// `Ok(None)` means the backend completed without producing a pod.
    async fn ensure_running(&self) -> Result<Option<String>>;

    /// Stops and terminates every active pod
    async fn terminate(&self) -> Result<()>;

    /// Counts existing and running pods
    async fn count(&self) -> Result<PodCounts>;
}
