//! Stats store
//!
//! Thread-safe holder of the counters published by the telemetry server.
//! The cycle loop writes, HTTP handlers read; every access takes the same
//! lock for the time it takes to copy one value.

use std::sync::{Mutex, MutexGuard, PoisonError};

use podcycle_core::domain::stats::StatsSnapshot;

/// Shared telemetry counters
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsSnapshot>,
}

impl Stats {
    /// Creates a store with every counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the counters, recovering from poisoning
    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_pods_total(&self, value: u64) {
        self.lock().pods_total = value;
    }

    pub fn get_pods_total(&self) -> u64 {
        self.lock().pods_total
    }

    pub fn set_pods_running(&self, value: u64) {
        self.lock().pods_running = value;
    }

    pub fn get_pods_running(&self) -> u64 {
        self.lock().pods_running
    }

    pub fn set_pipeline_last_run_time(&self, value: i64) {
        self.lock().pipeline_last_run_time = value;
    }

    pub fn get_pipeline_last_run_time(&self) -> i64 {
        self.lock().pipeline_last_run_time
    }

    /// Copy of all three counters taken under one lock
    pub fn get_all(&self) -> StatsSnapshot {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TEST_TIMESTAMP: i64 = 1234567890;

    #[test]
    fn test_stats_initialization() {
        let stats = Stats::new();
        assert_eq!(stats.get_pods_total(), 0);
        assert_eq!(stats.get_pods_running(), 0);
        assert_eq!(stats.get_pipeline_last_run_time(), 0);
    }

    #[test]
    fn test_set_get_round_trip() {
        let stats = Stats::new();

        stats.set_pods_total(5);
        assert_eq!(stats.get_pods_total(), 5);
        stats.set_pods_total(0);
        assert_eq!(stats.get_pods_total(), 0);

        stats.set_pods_running(3);
        assert_eq!(stats.get_pods_running(), 3);

        stats.set_pipeline_last_run_time(TEST_TIMESTAMP);
        assert_eq!(stats.get_pipeline_last_run_time(), TEST_TIMESTAMP);
    }

    #[test]
    fn test_get_all_reflects_latest_values() {
        let stats = Stats::new();
        assert_eq!(stats.get_all(), StatsSnapshot::default());

        stats.set_pods_total(5);
        stats.set_pods_running(3);
        stats.set_pipeline_last_run_time(TEST_TIMESTAMP);
        stats.set_pods_total(7);

        assert_eq!(
            stats.get_all(),
            StatsSnapshot {
                pods_total: 7,
                pods_running: 3,
                pipeline_last_run_time: TEST_TIMESTAMP,
            }
        );
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let stats = Arc::new(Stats::new());

        let writers: Vec<_> = (0..4u64)
            .map(|i| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for n in 0..1000 {
                        stats.set_pods_total(i * 1000 + n);
                        stats.set_pods_running(n);
                    }
                })
            })
            .collect();

        let reader = {
            let stats = Arc::clone(&stats);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let snapshot = stats.get_all();
                    assert!(snapshot.pods_running < 1000);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(stats.get_pods_running(), 999);
    }
}
