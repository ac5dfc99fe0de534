//! Per-orchestrator failure bookkeeping.
//!
//! Records live in a process-wide map owned by the monitoring service and
//! are cleared when monitoring stops or the orchestrator is deleted. The
//! tracker never stops a failing orchestrator; it only powers health queries
//! so external callers can alert or pause it explicitly.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Consecutive failures at or beyond this mark an orchestrator unhealthy.
pub const UNHEALTHY_THRESHOLD: u32 = 3;

/// Health bookkeeping for one orchestrator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureMetrics {
    pub consecutive_failures: u32,
    /// Monotonic; never reset by a success.
    pub total_failures: u64,
    /// Milliseconds since epoch.
    pub last_failure_at: Option<i64>,
    pub last_success_at: Option<i64>,
}

impl FailureMetrics {
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures < UNHEALTHY_THRESHOLD
    }
}

/// Process-wide failure metrics map, keyed by orchestrator id.
///
/// Guarded by a sync RwLock: ticks for different orchestrators fire
/// simultaneously, and the critical sections never hold the lock across an
/// await point.
#[derive(Debug, Default)]
pub struct FailureTracker {
    metrics: RwLock<HashMap<String, FailureMetrics>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the consecutive counter and stamp the success.
    pub fn record_success(&self, orchestrator_id: &str) {
        let mut map = self.metrics.write().expect("failure tracker poisoned");
        let entry = map.entry(orchestrator_id.to_string()).or_default();
        entry.consecutive_failures = 0;
        entry.last_success_at = Some(chrono::Utc::now().timestamp_millis());
    }

    /// Increment both counters and stamp the failure.
    pub fn record_failure(&self, orchestrator_id: &str) {
        let mut map = self.metrics.write().expect("failure tracker poisoned");
        let entry = map.entry(orchestrator_id.to_string()).or_default();
        entry.consecutive_failures += 1;
        entry.total_failures += 1;
        entry.last_failure_at = Some(chrono::Utc::now().timestamp_millis());
    }

    pub fn get(&self, orchestrator_id: &str) -> Option<FailureMetrics> {
        self.metrics
            .read()
            .expect("failure tracker poisoned")
            .get(orchestrator_id)
            .cloned()
    }

    pub fn get_all(&self) -> HashMap<String, FailureMetrics> {
        self.metrics
            .read()
            .expect("failure tracker poisoned")
            .clone()
    }

    /// Remove the record entirely. Called on stop/delete.
    pub fn clear(&self, orchestrator_id: &str) {
        self.metrics
            .write()
            .expect("failure tracker poisoned")
            .remove(orchestrator_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_failures_unhealthy_then_success_recovers() {
        let tracker = FailureTracker::new();

        tracker.record_failure("o1");
        tracker.record_failure("o1");
        assert!(tracker.get("o1").unwrap().is_healthy());

        tracker.record_failure("o1");
        let metrics = tracker.get("o1").unwrap();
        assert!(!metrics.is_healthy());
        assert_eq!(metrics.consecutive_failures, 3);
        assert_eq!(metrics.total_failures, 3);

        tracker.record_success("o1");
        let metrics = tracker.get("o1").unwrap();
        assert!(metrics.is_healthy());
        assert_eq!(metrics.consecutive_failures, 0);
        // Total is monotonic.
        assert_eq!(metrics.total_failures, 3);
        assert!(metrics.last_success_at.is_some());
        assert!(metrics.last_failure_at.is_some());
    }

    #[test]
    fn test_lazy_creation_and_clear() {
        let tracker = FailureTracker::new();
        assert!(tracker.get("o1").is_none());

        tracker.record_success("o1");
        assert!(tracker.get("o1").is_some());

        tracker.clear("o1");
        assert!(tracker.get("o1").is_none());
    }

    #[test]
    fn test_metrics_isolated_per_orchestrator() {
        let tracker = FailureTracker::new();
        tracker.record_failure("o1");
        tracker.record_failure("o1");
        tracker.record_failure("o1");
        tracker.record_success("o2");

        assert!(!tracker.get("o1").unwrap().is_healthy());
        assert!(tracker.get("o2").unwrap().is_healthy());
        assert_eq!(tracker.get_all().len(), 2);
    }
}
