//! Cycle state machine
//!
//! Drives the pod through one cycle per `cycle_duration`:
//!
//! ```text
//! STARTING_CYCLE -> ATTEMPTING_POD_START -> WAITING_FOR_IDLE
//!     -> ATTEMPTING_PIPELINE_RUN -> UPDATING_COUNTS
//! ```
//!
//! Any failure along the way terminates the pod and parks the cycle in
//! WAITING_AFTER_FAILURE. Every tick first checks the cycle boundary: once a
//! full `cycle_duration` has elapsed the cycle restarts, whatever its phase.
//!
//! Gateway failures are ordinary outcomes here. The only error the loop
//! returns is a [`CycleError`], meaning the machine reached a state it can
//! never legitimately be in; the loop then raises the shutdown signal and
//! stops. [`run_supervised`] extends the same treatment to panics.

pub mod state;

use std::sync::Arc;
use std::time::Duration;

use podcycle_core::domain::phase::Phase;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CycleTimings;
use crate::gateway::PodLifecycle;
use crate::telemetry::TelemetryServer;
use state::{Cycle, is_due};

/// Internal consistency violations; always fatal
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("invalid phase transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("phase {0} reached without a pod")]
    MissingPod(Phase),

    #[error("cycle loop panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, CycleError>;

/// Owner of the running cycle and the loop that advances it
pub struct CycleManager {
    gateway: Arc<dyn PodLifecycle>,
    telemetry: Arc<TelemetryServer>,
    timings: CycleTimings,
    shutdown: CancellationToken,
    cycle: Cycle,
}

impl CycleManager {
    pub fn new(
        gateway: Arc<dyn PodLifecycle>,
        telemetry: Arc<TelemetryServer>,
        timings: CycleTimings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            telemetry,
            timings,
            shutdown,
            cycle: Cycle::new(Instant::now()),
        }
    }

    #[cfg(test)]
    fn phase(&self) -> Phase {
        self.cycle.phase
    }

    #[cfg(test)]
    fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    /// Runs ticks until the shutdown token is cancelled
    ///
    /// Returns an error only for a fatal consistency violation, after
    /// cancelling the token so the rest of the process winds down too.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Cycle loop started (cycle duration {:?}, tick {:?})",
            self.timings.cycle_duration, self.timings.tick_interval
        );

        while !self.shutdown.is_cancelled() {
            if let Err(e) = self.tick().await {
                error!(
                    cycle_id = %self.cycle.id,
                    "CRITICAL: {}. Shutting down.", e
                );
                self.shutdown.cancel();
                return Err(e);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.timings.tick_interval) => {}
            }
        }

        info!(
            cycle_id = %self.cycle.id,
            phase = %self.cycle.phase,
            "Cycle loop stopped"
        );
        Ok(())
    }

    /// One loop iteration: cycle boundary check, then the phase handler
    pub async fn tick(&mut self) -> Result<()> {
        let now = Instant::now();

        if self.cycle.phase != Phase::StartingCycle
            && self.cycle.elapsed(now) >= self.timings.cycle_duration
        {
            info!(
                cycle_id = %self.cycle.id,
                phase = %self.cycle.phase,
                "Cycle duration elapsed, starting a new cycle"
            );
            self.transition(Phase::StartingCycle)?;
        }

        match self.cycle.phase {
            Phase::StartingCycle => self.start_cycle(now),
            Phase::AttemptingPodStart => self.attempt_pod_start().await,
            Phase::WaitingForIdle => self.wait_for_idle(now).await,
            Phase::AttemptingPipelineRun => self.attempt_pipeline_run().await,
            Phase::UpdatingCounts => {
                self.update_counts(now).await;
                Ok(())
            }
            Phase::WaitingAfterFailure => {
                self.wait_after_failure(now);
                Ok(())
            }
        }
    }

    /// Moves to `next` if the phase graph allows it
    fn transition(&mut self, next: Phase) -> Result<()> {
        let from = self.cycle.phase;

        if !from.can_transition_to(next) {
            return Err(CycleError::InvalidTransition { from, to: next });
        }
        if next.requires_pod() && self.cycle.pod.is_none() {
            return Err(CycleError::MissingPod(next));
        }

        if from != next {
            debug!(cycle_id = %self.cycle.id, "Phase {} -> {}", from, next);
        }
        self.cycle.phase = next;
        Ok(())
    }

    fn start_cycle(&mut self, now: Instant) -> Result<()> {
        self.cycle.reset(now);
        info!(cycle_id = %self.cycle.id, "Starting new cycle");
        self.transition(Phase::AttemptingPodStart)
    }

    async fn attempt_pod_start(&mut self) -> Result<()> {
        info!(cycle_id = %self.cycle.id, "Starting pod");

        match self.gateway.ensure_started().await {
            Some(pod) => {
                info!(cycle_id = %self.cycle.id, pod_id = %pod.id, "Pod started, waiting for idle");
                self.cycle.pod = Some(pod);
                // The start may have taken minutes; the idle wait begins now
                self.cycle.idle_wait_started = Some(Instant::now());
                self.cycle.last_idle_check = None;
                self.transition(Phase::WaitingForIdle)
            }
            None => self.fail_cycle("Failed to start pod").await,
        }
    }

    async fn wait_for_idle(&mut self, now: Instant) -> Result<()> {
        let Some(pod) = self.cycle.pod.clone() else {
            return Err(CycleError::MissingPod(Phase::WaitingForIdle));
        };

        let waited = self
            .cycle
            .idle_wait_started
            .map_or(Duration::ZERO, |since| {
                now.saturating_duration_since(since)
            });
        if waited >= self.timings.idle_wait_timeout {
            return self
                .fail_cycle(&format!(
                    "Pod {} did not become idle within {:?}",
                    pod.id, self.timings.idle_wait_timeout
                ))
                .await;
        }

        if !is_due(
            self.cycle.last_idle_check,
            self.timings.idle_check_interval,
            now,
        ) {
            return Ok(());
        }
        self.cycle.last_idle_check = Some(now);

        if self.gateway.check_idle(&pod).await {
            self.transition(Phase::AttemptingPipelineRun)
        } else {
            debug!(
                cycle_id = %self.cycle.id,
                pod_id = %pod.id,
                "Pod not idle after {:?}", waited
            );
            Ok(())
        }
    }

    async fn attempt_pipeline_run(&mut self) -> Result<()> {
        let Some(pod) = self.cycle.pod.clone() else {
            return Err(CycleError::MissingPod(Phase::AttemptingPipelineRun));
        };

        if self.gateway.trigger_run(&pod).await {
            info!(cycle_id = %self.cycle.id, pod_id = %pod.id, "Pipeline run started");
            self.transition(Phase::UpdatingCounts)
        } else {
            self.fail_cycle(&format!("Failed to trigger pipeline run on pod {}", pod.id))
                .await
        }
    }

    async fn update_counts(&mut self, now: Instant) {
        if !is_due(
            self.cycle.last_count_update,
            self.timings.count_update_interval,
            now,
        ) {
            return;
        }
        self.cycle.last_count_update = Some(now);

        match self.gateway.count().await {
            Some(counts) => {
                self.telemetry.update_pods_total(counts.total);
                self.telemetry.update_pods_running(counts.running);
            }
            None => warn!(cycle_id = %self.cycle.id, "Pod counts unavailable"),
        }
    }

    fn wait_after_failure(&self, now: Instant) {
        let remaining = self
            .timings
            .cycle_duration
            .saturating_sub(self.cycle.elapsed(now));
        debug!(
            cycle_id = %self.cycle.id,
            "Waiting after failure, next cycle in {}s",
            remaining.as_secs()
        );
    }

    /// Terminates the pod and parks the cycle until the next boundary
    async fn fail_cycle(&mut self, reason: &str) -> Result<()> {
        error!(
            cycle_id = %self.cycle.id,
            phase = %self.cycle.phase,
            "{}; terminating pods", reason
        );

        if !self.gateway.terminate_all().await {
            warn!(cycle_id = %self.cycle.id, "Pod termination failed, continuing");
        }

        self.cycle.pod = None;
        self.cycle.idle_wait_started = None;
        self.transition(Phase::WaitingAfterFailure)
    }
}

/// Runs the loop on its own task so a panic cannot bypass shutdown
///
/// A panic anywhere in a phase handler or gateway call is logged at critical
/// severity, cancels the shutdown token and is reported as
/// [`CycleError::Panicked`], the same way a consistency violation is.
pub async fn run_supervised(mut manager: CycleManager) -> Result<()> {
    let shutdown = manager.shutdown.clone();
    let handle = tokio::spawn(async move { manager.run().await });

    match handle.await {
        Ok(result) => result,
        Err(e) => {
            let detail = if e.is_panic() {
                crate::panic::describe(e.into_panic().as_ref())
            } else {
                "cycle task was cancelled".to_string()
            };
            error!("CRITICAL: cycle loop panicked: {}. Shutting down.", detail);
            shutdown.cancel();
            Err(CycleError::Panicked(detail))
        }
    }
}
