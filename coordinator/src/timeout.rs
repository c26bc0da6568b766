//! Deadline triggers. One detached timer task per LRA with a time
//! limit; firing goes through the normal cancel path so it observes the
//! same transition rules as an explicit cancel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::future::{AbortHandle, Abortable};
use tracing::{debug, info, warn};

use lra_common::{LraError, LraId, Timestamp};

use crate::coordinator::Coordinator;

/// Tracks one abortable timer task per LRA. Entries carry a generation
/// number so a stale trigger can never unregister its replacement.
pub struct TimeoutScheduler {
    timers: Arc<DashMap<LraId, (u64, AbortHandle)>>,
    generation: AtomicU64,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self {
            timers: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Arm (or re-arm) the deadline trigger for an LRA. An existing
    /// timer is aborted before the new one is registered, so renewal is
    /// atomic with respect to the old deadline.
    pub fn schedule(&self, coordinator: Weak<Coordinator>, lra_id: LraId, deadline: Timestamp) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (abort, registration) = AbortHandle::new_pair();
        if let Some((_, old)) = self.timers.insert(lra_id, (generation, abort)) {
            old.abort();
        }

        let timers = Arc::clone(&self.timers);
        let task = async move {
            tokio::time::sleep(lra_common::time::remaining_std(deadline)).await;

            // Deregister only our own entry. A renewal may already have
            // installed a newer trigger under the same id; removing it
            // would leave that timer running but unabortable. This also
            // keeps the cancel inside finalize from aborting this task
            // mid-flight.
            timers.remove_if(&lra_id, |_, entry| entry.0 == generation);

            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            // Re-check against the registry: the deadline may have been
            // renewed or the LRA may already be ending.
            if !coordinator.deadline_expired(&lra_id) {
                debug!(lra_id = %lra_id, "stale deadline trigger, ignoring");
                return;
            }

            coordinator.metrics().timeout_fired();
            match coordinator.cancel(lra_id).await {
                Ok(status) => {
                    info!(lra_id = %lra_id, status = %status, "deadline expired, LRA cancelled")
                }
                Err(LraError::PreconditionFailed { .. }) | Err(LraError::NotFound(_)) => {
                    debug!(lra_id = %lra_id, "deadline trigger lost the race, ignoring")
                }
                Err(e) => warn!(lra_id = %lra_id, error = %e, "deadline cancellation failed"),
            }
        };
        tokio::spawn(Abortable::new(task, registration));
    }

    /// Disarm the trigger for an LRA, if any.
    pub fn cancel(&self, lra_id: &LraId) {
        if let Some((_, (_, handle))) = self.timers.remove(lra_id) {
            handle.abort();
        }
    }

    /// Number of armed triggers.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Default for TimeoutScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use lra_common::{ClientId, LraStatus};

    #[tokio::test]
    async fn test_cancel_disarms_trigger() {
        let coordinator =
            Arc::new(Coordinator::new(&CoordinatorConfig::default()).unwrap());
        let scheduler = TimeoutScheduler::new();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();

        let deadline = lra_common::time::now() + chrono::Duration::milliseconds(50);
        scheduler.schedule(Arc::downgrade(&coordinator), id, deadline);
        assert_eq!(scheduler.active_count(), 1);
        scheduler.cancel(&id);
        assert_eq!(scheduler.active_count(), 0);

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(coordinator.status(id).unwrap(), LraStatus::Active);
    }

    #[tokio::test]
    async fn test_stale_trigger_leaves_newer_entry_registered() {
        let coordinator =
            Arc::new(Coordinator::new(&CoordinatorConfig::default()).unwrap());
        let scheduler = TimeoutScheduler::new();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();

        // Arm a trigger that fires immediately.
        let past = lra_common::time::now() - chrono::Duration::seconds(1);
        scheduler.schedule(Arc::downgrade(&coordinator), id, past);

        // Bump the stored generation, as a renewal racing the firing
        // would: the stale task must not unregister the newer entry.
        scheduler.timers.get_mut(&id).unwrap().0 += 1;

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(scheduler.active_count(), 1);
        // The LRA has no deadline, so the stale firing did not cancel it.
        assert_eq!(coordinator.status(id).unwrap(), LraStatus::Active);
    }

    #[tokio::test]
    async fn test_trigger_on_dropped_coordinator_is_harmless() {
        let coordinator =
            Arc::new(Coordinator::new(&CoordinatorConfig::default()).unwrap());
        let scheduler = TimeoutScheduler::new();
        let id = LraId::new();

        let deadline = lra_common::time::now() + chrono::Duration::milliseconds(10);
        scheduler.schedule(Arc::downgrade(&coordinator), id, deadline);
        drop(coordinator);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}
