//! Cycle phase domain model
//!
//! A cycle moves through a fixed set of phases. Which phase may follow which
//! is encoded here so the state machine can reject impossible transitions.

use serde::{Deserialize, Serialize};

/// Phase of the hourly pod cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Resetting cycle bookkeeping before a new attempt
    StartingCycle,

    /// Asking the provisioner to start (or confirm) the pod
    AttemptingPodStart,

    /// Polling the pod until it reports idle
    WaitingForIdle,

    /// Triggering the pipeline run on the pod
    AttemptingPipelineRun,

    /// Nominal resting phase, periodically refreshing pod counts
    UpdatingCounts,

    /// Cooldown after any failure, held until the next cycle boundary
    WaitingAfterFailure,
}

impl Phase {
    /// All phases, in cycle order
    pub const ALL: [Phase; 6] = [
        Phase::StartingCycle,
        Phase::AttemptingPodStart,
        Phase::WaitingForIdle,
        Phase::AttemptingPipelineRun,
        Phase::UpdatingCounts,
        Phase::WaitingAfterFailure,
    ];

    /// Stable upper-case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::StartingCycle => "STARTING_CYCLE",
            Phase::AttemptingPodStart => "ATTEMPTING_POD_START",
            Phase::WaitingForIdle => "WAITING_FOR_IDLE",
            Phase::AttemptingPipelineRun => "ATTEMPTING_PIPELINE_RUN",
            Phase::UpdatingCounts => "UPDATING_COUNTS",
            Phase::WaitingAfterFailure => "WAITING_AFTER_FAILURE",
        }
    }

    /// Whether the cycle may move from `self` to `next`
    ///
    /// Staying in the same phase is always allowed, and every phase may be
    /// forced back to `StartingCycle` by the hourly reset.
    pub fn can_transition_to(self, next: Phase) -> bool {
        if self == next || next == Phase::StartingCycle {
            return true;
        }

        matches!(
            (self, next),
            (Phase::StartingCycle, Phase::AttemptingPodStart)
                | (Phase::AttemptingPodStart, Phase::WaitingForIdle)
                | (Phase::AttemptingPodStart, Phase::WaitingAfterFailure)
                | (Phase::WaitingForIdle, Phase::AttemptingPipelineRun)
                | (Phase::WaitingForIdle, Phase::WaitingAfterFailure)
                | (Phase::AttemptingPipelineRun, Phase::UpdatingCounts)
                | (Phase::AttemptingPipelineRun, Phase::WaitingAfterFailure)
        )
    }

    /// Phases that need a pod reference recorded on the cycle
    pub fn requires_pod(self) -> bool {
        matches!(self, Phase::WaitingForIdle | Phase::AttemptingPipelineRun)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_phase_can_reset() {
        for phase in Phase::ALL {
            assert!(phase.can_transition_to(Phase::StartingCycle));
            assert!(phase.can_transition_to(phase));
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(Phase::StartingCycle.can_transition_to(Phase::AttemptingPodStart));
        assert!(Phase::AttemptingPodStart.can_transition_to(Phase::WaitingForIdle));
        assert!(Phase::WaitingForIdle.can_transition_to(Phase::AttemptingPipelineRun));
        assert!(Phase::AttemptingPipelineRun.can_transition_to(Phase::UpdatingCounts));
    }

    #[test]
    fn test_resting_phases_only_leave_through_reset() {
        for next in Phase::ALL {
            if next == Phase::StartingCycle {
                continue;
            }
            if next != Phase::UpdatingCounts {
                assert!(!Phase::UpdatingCounts.can_transition_to(next));
            }
            if next != Phase::WaitingAfterFailure {
                assert!(!Phase::WaitingAfterFailure.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_skipping_phases_is_rejected() {
        assert!(!Phase::StartingCycle.can_transition_to(Phase::UpdatingCounts));
        assert!(!Phase::StartingCycle.can_transition_to(Phase::WaitingAfterFailure));
        assert!(!Phase::AttemptingPodStart.can_transition_to(Phase::AttemptingPipelineRun));
    }

    #[test]
    fn test_serialized_names_match_display() {
        for phase in Phase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase));
        }
    }
}
