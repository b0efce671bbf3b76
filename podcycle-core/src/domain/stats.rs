//! Telemetry stats domain model

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the manager's telemetry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Pods known to the provisioner
    pub pods_total: u64,

    /// Pods currently running
    pub pods_running: u64,

    /// Unix timestamp (seconds) of the last confirmed pipeline run, 0 if none
    pub pipeline_last_run_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_zeroed() {
        let snapshot = StatsSnapshot::default();
        assert_eq!(snapshot.pods_total, 0);
        assert_eq!(snapshot.pods_running, 0);
        assert_eq!(snapshot.pipeline_last_run_time, 0);
    }

    #[test]
    fn test_snapshot_field_names() {
        let value = serde_json::to_value(StatsSnapshot {
            pods_total: 3,
            pods_running: 1,
            pipeline_last_run_time: 1234567890,
        })
        .unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "pods_total": 3,
                "pods_running": 1,
                "pipeline_last_run_time": 1234567890
            })
        );
    }
}
