//! Per-cycle bookkeeping

use std::time::Duration;

use podcycle_core::domain::phase::Phase;
use podcycle_core::domain::pod::PodRef;
use tokio::time::Instant;
use uuid::Uuid;

/// One hourly iteration of the pod lifecycle
#[derive(Debug, Clone)]
pub struct Cycle {
    /// Identifier attached to every log line of this cycle
    pub id: Uuid,

    pub started_at: Instant,
    pub phase: Phase,

    /// Pod started during this cycle, `None` until the start succeeds
    pub pod: Option<PodRef>,

    /// When the cycle entered `WaitingForIdle`
    pub idle_wait_started: Option<Instant>,

    pub last_idle_check: Option<Instant>,
    pub last_count_update: Option<Instant>,
}

impl Cycle {
    /// A fresh cycle waiting to be started
    pub fn new(now: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            phase: Phase::StartingCycle,
            pod: None,
            idle_wait_started: None,
            last_idle_check: None,
            last_count_update: None,
        }
    }

    /// Starts a new cycle at `now`, forgetting the pod and every interval
    /// timestamp. The phase is left to the caller.
    pub fn reset(&mut self, now: Instant) {
        self.id = Uuid::new_v4();
        self.started_at = now;
        self.pod = None;
        self.idle_wait_started = None;
        self.last_idle_check = None;
        self.last_count_update = None;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

/// Whether at least `interval` has passed since `last` (always true if never)
pub fn is_due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
    last.is_none_or(|last| now.saturating_duration_since(last) >= interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_bookkeeping() {
        let start = Instant::now();
        let mut cycle = Cycle::new(start);
        let first_id = cycle.id;

        cycle.pod = Some(PodRef::from_template("abc", "http://{pod_id}"));
        cycle.last_idle_check = Some(start);
        cycle.last_count_update = Some(start);
        cycle.idle_wait_started = Some(start);
        cycle.phase = Phase::UpdatingCounts;

        tokio::time::advance(Duration::from_secs(10)).await;
        let now = Instant::now();
        cycle.reset(now);

        assert_ne!(cycle.id, first_id);
        assert_eq!(cycle.started_at, now);
        assert_eq!(cycle.phase, Phase::UpdatingCounts);
        assert!(cycle.pod.is_none());
        assert!(cycle.idle_wait_started.is_none());
        assert!(cycle.last_idle_check.is_none());
        assert!(cycle.last_count_update.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed() {
        let cycle = Cycle::new(Instant::now());
        tokio::time::advance(Duration::from_secs(42)).await;
        assert_eq!(cycle.elapsed(Instant::now()), Duration::from_secs(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_due() {
        let interval = Duration::from_secs(5);
        let last = Instant::now();

        assert!(is_due(None, interval, last));
        assert!(!is_due(Some(last), interval, last));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!is_due(Some(last), interval, Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(is_due(Some(last), interval, Instant::now()));
    }
}
