//! Recovery engine: the periodic sweep that converges every LRA toward
//! a terminal status and discharges finished records.
//!
//! Delivery is at-least-once: ambiguous and in-flight notifications are
//! retried every sweep until the participant reports a terminal state,
//! consulting the participant's status endpoint first when one was
//! registered.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use lra_client::{NotificationOutcome, StatusProbe};
use lra_common::{Direction, Lra, LraStatus, Participant, ParticipantStatus};

use crate::config::RecoveryConfig;
use crate::coordinator::Coordinator;

/// Counters for one recovery sweep.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepStats {
    /// LRAs examined this sweep.
    pub lras_examined: usize,
    /// Expired deadlines acted on (missed or in-flight timer).
    pub deadlines_enforced: usize,
    /// Participant notifications re-driven.
    pub notifications_retried: usize,
    /// Status endpoints consulted.
    pub statuses_probed: usize,
    /// Failed participants acknowledged via their forget endpoint.
    pub participants_forgotten: usize,
    /// After-LRA listeners notified.
    pub listeners_notified: usize,
    /// Fully discharged LRAs removed from the registry.
    pub lras_removed: usize,
}

/// Periodically sweeps the registry and re-drives anything stuck.
pub struct RecoveryEngine {
    coordinator: Arc<Coordinator>,
    config: RecoveryConfig,
}

impl RecoveryEngine {
    pub fn new(coordinator: Arc<Coordinator>, config: RecoveryConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Run sweeps forever at the configured interval.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let stats = self.run_sweep().await;
            if stats.notifications_retried > 0 || stats.lras_removed > 0 {
                info!(?stats, "recovery sweep finished");
            } else {
                debug!(?stats, "recovery sweep finished");
            }
        }
    }

    /// One pass over every known LRA.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        self.coordinator.metrics().recovery_sweep();

        for lra in self.coordinator.registry().snapshot() {
            stats.lras_examined += 1;
            match lra.status {
                LraStatus::Active => self.enforce_deadline(&lra, &mut stats).await,
                LraStatus::Closing => {
                    // An expired deadline still overrides an in-flight
                    // close.
                    self.enforce_deadline(&lra, &mut stats).await;
                    self.converge_ending(&lra, Direction::Complete, &mut stats)
                        .await;
                }
                LraStatus::Cancelling => {
                    self.converge_ending(&lra, Direction::Compensate, &mut stats)
                        .await
                }
                _ => self.discharge_finished(&lra, &mut stats).await,
            }
        }

        stats
    }

    /// Cancel an LRA whose deadline passed without its timer firing
    /// (e.g. after a restart that lost the in-memory triggers).
    async fn enforce_deadline(&self, lra: &Lra, stats: &mut SweepStats) {
        if !lra.is_deadline_expired() {
            return;
        }
        stats.deadlines_enforced += 1;
        self.coordinator.metrics().timeout_fired();
        match self.coordinator.cancel(lra.id).await {
            Ok(status) => info!(lra_id = %lra.id, status = %status, "expired LRA cancelled by sweep"),
            Err(e) => debug!(lra_id = %lra.id, error = %e, "expired LRA already ending"),
        }
    }

    /// Re-drive every unfinished participant of an ending LRA, then try
    /// to settle the final status.
    async fn converge_ending(&self, lra: &Lra, direction: Direction, stats: &mut SweepStats) {
        // Re-read: enforce_deadline may have flipped Closing to
        // Cancelling, which supersedes the complete pass.
        match self.coordinator.registry().status(&lra.id) {
            Ok(status) if status == lra.status => {}
            _ => return,
        }

        for participant in &lra.participants {
            if participant.status == direction.in_progress() {
                self.resolve_in_flight(lra, participant, direction, stats)
                    .await;
            } else if participant.status == ParticipantStatus::Active {
                // Never notified: the first delivery was lost.
                stats.notifications_retried += 1;
                self.coordinator.metrics().notification_retried();
                self.coordinator
                    .drive_participant(lra.id, participant.recovery_token, direction, lra.parent_id, false)
                    .await;
            }
        }

        if let Err(e) = self.coordinator.finalize(lra.id).await {
            warn!(lra_id = %lra.id, error = %e, "failed to settle LRA");
        }
    }

    /// A participant we already notified but whose outcome is unknown:
    /// ask its status endpoint before delivering the callback again.
    async fn resolve_in_flight(
        &self,
        lra: &Lra,
        participant: &Participant,
        direction: Direction,
        stats: &mut SweepStats,
    ) {
        if participant.endpoints.status.is_some() {
            stats.statuses_probed += 1;
            let _ = self
                .coordinator
                .registry()
                .with_participant(&lra.id, &participant.recovery_token, |p| {
                    p.status_calls += 1;
                    Ok(())
                });

            match self.coordinator.client().probe_status(participant).await {
                StatusProbe::Reported(reported) if reported.is_terminal() => {
                    if let Err(e) = self.coordinator.registry().set_participant_status(
                        &lra.id,
                        &participant.recovery_token,
                        reported,
                    ) {
                        warn!(lra_id = %lra.id, token = %participant.recovery_token,
                              error = %e, "reported status not applicable");
                    }
                    return;
                }
                StatusProbe::Finished => {
                    // Resource gone after the end phase: treat as done.
                    self.coordinator.persist_outcome(
                        lra.id,
                        participant.recovery_token,
                        direction,
                        NotificationOutcome::Done,
                    );
                    return;
                }
                StatusProbe::Unreachable(reason) => {
                    debug!(lra_id = %lra.id, token = %participant.recovery_token,
                           reason, "participant unreachable, retrying next sweep");
                    return;
                }
                StatusProbe::Reported(_) | StatusProbe::Undetermined => {}
            }
        }

        stats.notifications_retried += 1;
        self.coordinator.metrics().notification_retried();
        self.coordinator
            .drive_participant(lra.id, participant.recovery_token, direction, lra.parent_id, true)
            .await;
    }

    /// Walk a terminal LRA: finish retained nested compensations, let
    /// failed participants be forgotten, release discharged enlistments
    /// and finally the record itself.
    async fn discharge_finished(&self, lra: &Lra, stats: &mut SweepStats) {
        for participant in &lra.participants {
            if participant.status == ParticipantStatus::Compensating {
                // Retained nested compensation that did not finish when
                // the parent cancelled.
                stats.notifications_retried += 1;
                self.coordinator.metrics().notification_retried();
                self.coordinator
                    .drive_participant(
                        lra.id,
                        participant.recovery_token,
                        Direction::Compensate,
                        lra.parent_id,
                        true,
                    )
                    .await;
            } else if participant.status.is_failed() {
                self.forget(lra, participant, stats).await;
            } else if participant.status.is_terminal() && self.releasable(lra) {
                let _ = self
                    .coordinator
                    .registry()
                    .remove_participant(&lra.id, &participant.recovery_token);
            }
        }

        self.retry_after_notifications(lra, stats).await;

        // Drop the record once nothing remains to deliver or retain.
        if let Ok(current) = self.coordinator.registry().get(&lra.id) {
            let after_pending = current.participants.iter().any(|p| p.after_pending);
            if current.participants.is_empty() && !after_pending {
                self.coordinator.purge(&lra.id);
                stats.lras_removed += 1;
                info!(lra_id = %lra.id, "LRA record removed");
            }
        }
    }

    /// Successful enlistments of a nested LRA stay compensable until the
    /// parent itself finishes.
    fn releasable(&self, lra: &Lra) -> bool {
        match lra.parent_id {
            None => true,
            Some(parent) => match self.coordinator.registry().status(&parent) {
                Ok(status) => status.is_terminal(),
                Err(_) => true,
            },
        }
    }

    /// Acknowledge a failed participant through its forget endpoint; the
    /// enlistment is released only after a successful acknowledgement.
    async fn forget(&self, lra: &Lra, participant: &Participant, stats: &mut SweepStats) {
        let _ = self
            .coordinator
            .registry()
            .with_participant(&lra.id, &participant.recovery_token, |p| {
                p.forget_calls += 1;
                Ok(())
            });
        if self.coordinator.client().forget(participant).await {
            stats.participants_forgotten += 1;
            let _ = self
                .coordinator
                .registry()
                .remove_participant(&lra.id, &participant.recovery_token);
            info!(lra_id = %lra.id, token = %participant.recovery_token, "failed participant forgotten");
        }
    }

    /// Re-deliver after-LRA notifications that did not get through when
    /// the LRA finished.
    async fn retry_after_notifications(&self, lra: &Lra, stats: &mut SweepStats) {
        let targets: Vec<_> = lra
            .participants
            .iter()
            .filter(|p| p.after_pending)
            .filter_map(|p| p.endpoints.after.clone().map(|url| (p.recovery_token, url)))
            .collect();
        if targets.is_empty() {
            return;
        }
        stats.listeners_notified += targets.len();
        self.coordinator
            .deliver_after_notifications(lra.id, lra.status, targets)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use lra_common::{ClientId, ParticipantEndpoints};

    fn create_test_engine() -> (Arc<Coordinator>, RecoveryEngine) {
        let coordinator =
            Arc::new(Coordinator::new(&CoordinatorConfig::default()).unwrap());
        let engine = RecoveryEngine::new(Arc::clone(&coordinator), RecoveryConfig::default());
        (coordinator, engine)
    }

    #[tokio::test]
    async fn test_sweep_removes_finished_lra() {
        let (coordinator, engine) = create_test_engine();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        coordinator.close(id).await.unwrap();

        let stats = engine.run_sweep().await;
        assert_eq!(stats.lras_removed, 1);
        assert!(coordinator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_enforces_missed_deadline() {
        let (coordinator, engine) = create_test_engine();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        // Backdate the deadline with no timer armed, as after a restart
        // that lost the in-memory triggers.
        coordinator
            .registry()
            .with_lra(&id, |lra| {
                lra.deadline = Some(lra_common::time::now() - chrono::Duration::seconds(1));
                Ok(())
            })
            .unwrap();

        let stats = engine.run_sweep().await;
        assert_eq!(stats.deadlines_enforced, 1);
    }

    #[tokio::test]
    async fn test_sweep_retains_nested_success_under_live_parent() {
        let (coordinator, engine) = create_test_engine();
        let parent = coordinator.start(None, ClientId::new("parent"), 0).unwrap();
        let child = coordinator
            .start(Some(parent), ClientId::new("child"), 0)
            .unwrap();
        let endpoints = ParticipantEndpoints {
            complete: Some("http://127.0.0.1:9/complete".into()),
            ..Default::default()
        };
        let token = coordinator.join(child, endpoints, None, None).unwrap();
        coordinator.close(child).await.unwrap();

        // The parent is still active, so the child's completed
        // participant must not be released.
        engine.run_sweep().await;
        let child_lra = coordinator.registry().get(&child).unwrap();
        assert!(child_lra.participant(&token).is_some());

        // Once the parent finishes, the sweep releases it.
        coordinator.close(parent).await.unwrap();
        engine.run_sweep().await;
        assert!(coordinator.registry().get(&child).is_err());
    }
}
