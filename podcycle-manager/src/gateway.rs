//! Pod lifecycle gateway
//!
//! Single entry point the cycle state machine uses for everything outside
//! the process: the provisioning backend and the pod's own HTTP interface.
//! Every failure is logged here and reduced to a boolean or `None`; nothing
//! raised below this layer reaches the state machine.

use std::sync::Arc;

use async_trait::async_trait;
use podcycle_client::{ClientError, PodClient};
use podcycle_core::domain::pod::{PodCounts, PodRef};
use podcycle_core::dto::pod::RunRequest;
use tracing::{debug, error, info, warn};

use crate::provisioner::Provisioner;
use crate::telemetry::TelemetryServer;

/// Operations the cycle state machine performs on the pod
#[async_trait]
pub trait PodLifecycle: Send + Sync {
    /// Starts or confirms the pod; `None` on any failure
    async fn ensure_started(&self) -> Option<PodRef>;

    /// Best-effort termination of every active pod
    async fn terminate_all(&self) -> bool;

    /// Current pod counts; `None` when unavailable or malformed
    async fn count(&self) -> Option<PodCounts>;

    /// Whether the pod reports itself idle
    async fn check_idle(&self, pod: &PodRef) -> bool;

    /// Starts a pipeline run on the pod; records the run time on success
    async fn trigger_run(&self, pod: &PodRef) -> bool;
}

/// Production gateway over a provisioner and the pod HTTP client
pub struct PodGateway {
    provisioner: Arc<dyn Provisioner>,
    client: PodClient,
    telemetry: Arc<TelemetryServer>,
    run_request: RunRequest,
    pod_url_template: String,
}

impl PodGateway {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        client: PodClient,
        telemetry: Arc<TelemetryServer>,
        run_request: RunRequest,
        pod_url_template: impl Into<String>,
    ) -> Self {
        Self {
            provisioner,
            client,
            telemetry,
            run_request,
            pod_url_template: pod_url_template.into(),
        }
    }
}

#[async_trait]
impl PodLifecycle for PodGateway {
    async fn ensure_started(&self) -> Option<PodRef> {
        match self.provisioner.ensure_running().await {
            Ok(Some(id)) if !id.trim().is_empty() => {
                let pod = PodRef::from_template(id.trim(), &self.pod_url_template);
                info!("Pod {} is running at {}", pod.id, pod.url);
                Some(pod)
            }
            Ok(_) => {
                error!("Provisioner finished without returning a pod id");
                None
            }
            Err(e) => {
                error!("Error starting pod: {}", e);
                None
            }
        }
    }

    async fn terminate_all(&self) -> bool {
        match self.provisioner.terminate().await {
            Ok(()) => {
                info!("Terminated active pods");
                true
            }
            Err(e) => {
                error!("Failed to terminate pods: {}", e);
                false
            }
        }
    }

    async fn count(&self) -> Option<PodCounts> {
        match self.provisioner.count().await {
            Ok(counts) => {
                debug!(
                    "Pod counts: total={}, running={}",
                    counts.total, counts.running
                );
                Some(counts)
            }
            Err(e) => {
                warn!("Invalid pod count result, skipping stats update: {}", e);
                None
            }
        }
    }

    async fn check_idle(&self, pod: &PodRef) -> bool {
        let url = format!("{}/status", pod.url);

        match self.client.status(&pod.url).await {
            Ok(status) if status.is_idle() => {
                info!("Pod {} is idle", pod.id);
                true
            }
            Ok(status) => {
                debug!("Pod {} not idle yet (status: {})", pod.id, status.status);
                false
            }
            Err(ClientError::ApiError { status, message }) => {
                warn!(
                    "Failed to get pod status from {}. Status: {} {}",
                    url, status, message
                );
                false
            }
            Err(ClientError::ParseError(e)) => {
                warn!("Failed to decode JSON response from {}: {}", url, e);
                false
            }
            Err(e) => {
                error!("Error requesting pod status from {}: {}", url, e);
                false
            }
        }
    }

    async fn trigger_run(&self, pod: &PodRef) -> bool {
        let url = format!("{}/run", pod.url);

        match self.client.trigger_run(&pod.url, &self.run_request).await {
            Ok(response) if response.success => {
                let now = chrono::Utc::now().timestamp();
                self.telemetry.update_pipeline_last_run_time(now);
                info!(
                    "Pipeline run triggered on pod {}: {}",
                    pod.id,
                    response.detail()
                );
                true
            }
            Ok(response) => {
                error!(
                    "Pipeline run trigger failed at {}: {}",
                    url,
                    response.detail()
                );
                false
            }
            Err(ClientError::RetriesExhausted { attempts, source }) => {
                error!(
                    "Pipeline run trigger at {} failed after multiple retries ({} attempts): {}",
                    url, attempts, source
                );
                false
            }
            Err(ClientError::ApiError { status, message }) => {
                warn!(
                    "Failed to trigger pipeline run at {}. Status: {} {}",
                    url, status, message
                );
                false
            }
            Err(ClientError::ParseError(e)) => {
                warn!("Failed to decode JSON response from {}: {}", url, e);
                false
            }
            Err(ClientError::UnexpectedResponse(body)) => {
                warn!("Unexpected JSON response format from {}: {}", url, body);
                false
            }
            Err(e) => {
                error!("Error triggering pipeline run at {}: {}", url, e);
                false
            }
        }
    }
}
