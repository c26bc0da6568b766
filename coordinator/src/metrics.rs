//! Metrics collection for coordinator monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Coordinator metrics.
pub struct Metrics {
    /// Total LRAs started.
    pub lras_started: AtomicU64,
    /// LRAs that reached `Closed`.
    pub lras_closed: AtomicU64,
    /// LRAs that reached `Cancelled`.
    pub lras_cancelled: AtomicU64,
    /// LRAs that reached a failed terminal state.
    pub lras_failed: AtomicU64,
    /// End-phase notifications delivered to participants.
    pub notifications_sent: AtomicU64,
    /// Notifications re-driven by the recovery engine.
    pub notifications_retried: AtomicU64,
    /// Deadline triggers that fired.
    pub timeouts_fired: AtomicU64,
    /// Recovery sweeps executed.
    pub recovery_sweeps: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            lras_started: AtomicU64::new(0),
            lras_closed: AtomicU64::new(0),
            lras_cancelled: AtomicU64::new(0),
            lras_failed: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_retried: AtomicU64::new(0),
            timeouts_fired: AtomicU64::new(0),
            recovery_sweeps: AtomicU64::new(0),
        }
    }

    pub fn lra_started(&self) {
        self.lras_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lra_closed(&self) {
        self.lras_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lra_cancelled(&self) {
        self.lras_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lra_failed(&self) {
        self.lras_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_retried(&self) {
        self.notifications_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeout_fired(&self) {
        self.timeouts_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn recovery_sweep(&self) {
        self.recovery_sweeps.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.lra_started();
        metrics.lra_started();
        metrics.notification_sent();
        assert_eq!(metrics.lras_started.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.notifications_sent.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.lras_closed.load(Ordering::Relaxed), 0);
    }
}
