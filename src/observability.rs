use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for verification outcomes and side-effect delivery
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    pub gate_accepts: AtomicU64,
    pub gate_rejects: AtomicU64,
    pub gate_unavailable: AtomicU64,
    pub side_effects_dispatched: AtomicU64,
    pub side_effects_succeeded: AtomicU64,
    pub side_effects_failed: AtomicU64,
    pub side_effects_timed_out: AtomicU64,
    pub side_effects_skipped: AtomicU64,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_gate_accept(&self) {
        self.gate_accepts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gate_reject(&self) {
        self.gate_rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gate_unavailable(&self) {
        self.gate_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.side_effects_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self) {
        self.side_effects_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.side_effects_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timed_out(&self) {
        self.side_effects_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.side_effects_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> LifecycleStats {
        LifecycleStats {
            gate_accepts: self.gate_accepts.load(Ordering::Relaxed),
            gate_rejects: self.gate_rejects.load(Ordering::Relaxed),
            gate_unavailable: self.gate_unavailable.load(Ordering::Relaxed),
            side_effects_dispatched: self.side_effects_dispatched.load(Ordering::Relaxed),
            side_effects_succeeded: self.side_effects_succeeded.load(Ordering::Relaxed),
            side_effects_failed: self.side_effects_failed.load(Ordering::Relaxed),
            side_effects_timed_out: self.side_effects_timed_out.load(Ordering::Relaxed),
            side_effects_skipped: self.side_effects_skipped.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            gate_accepts = stats.gate_accepts,
            gate_rejects = stats.gate_rejects,
            gate_unavailable = stats.gate_unavailable,
            dispatched = stats.side_effects_dispatched,
            succeeded = stats.side_effects_succeeded,
            failed = stats.side_effects_failed,
            timed_out = stats.side_effects_timed_out,
            skipped = stats.side_effects_skipped,
            "Lifecycle metrics"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleStats {
    pub gate_accepts: u64,
    pub gate_rejects: u64,
    pub gate_unavailable: u64,
    pub side_effects_dispatched: u64,
    pub side_effects_succeeded: u64,
    pub side_effects_failed: u64,
    pub side_effects_timed_out: u64,
    pub side_effects_skipped: u64,
}

/// Global metrics instance
static LIFECYCLE_METRICS: std::sync::LazyLock<LifecycleMetrics> =
    std::sync::LazyLock::new(LifecycleMetrics::new);

pub fn lifecycle_metrics() -> &'static LifecycleMetrics {
    &LIFECYCLE_METRICS
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = LifecycleMetrics::new();
        metrics.record_gate_accept();
        metrics.record_gate_reject();
        metrics.record_gate_reject();
        metrics.record_dispatched();
        metrics.record_succeeded();
        metrics.record_skipped();

        let stats = metrics.get_stats();
        assert_eq!(stats.gate_accepts, 1);
        assert_eq!(stats.gate_rejects, 2);
        assert_eq!(stats.gate_unavailable, 0);
        assert_eq!(stats.side_effects_dispatched, 1);
        assert_eq!(stats.side_effects_succeeded, 1);
        assert_eq!(stats.side_effects_skipped, 1);
    }
}
