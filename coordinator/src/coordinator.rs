//! Core coordinator implementation: the LRA state machine and the
//! completion/compensation driver.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use tracing::{debug, info, instrument, warn};

use lra_client::{NotificationOutcome, ParticipantClient};
use lra_common::{
    ClientId, Direction, Lra, LraError, LraId, LraStatus, Participant, ParticipantEndpoints,
    ParticipantStatus, RecoveryToken, Result,
};

use crate::config::CoordinatorConfig;
use crate::locks::TransitionLocks;
use crate::metrics::Metrics;
use crate::registry::LraRegistry;
use crate::timeout::TimeoutScheduler;

/// The coordinator: tracks LRAs, enlists participants, and drives them
/// through the completion/compensation protocol.
pub struct Coordinator {
    /// Single source of truth for LRA state.
    registry: Arc<LraRegistry>,
    /// Per-LRA transition locks.
    locks: TransitionLocks,
    /// Outbound participant invoker.
    client: Arc<ParticipantClient>,
    /// Deadline triggers.
    timeouts: TimeoutScheduler,
    /// Counters.
    metrics: Arc<Metrics>,
}

impl Coordinator {
    /// Create a new coordinator instance.
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        Ok(Self {
            registry: Arc::new(LraRegistry::new()),
            locks: TransitionLocks::new(),
            client: Arc::new(ParticipantClient::new(config.client_config.clone())?),
            timeouts: TimeoutScheduler::new(),
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// The LRA registry.
    pub fn registry(&self) -> &Arc<LraRegistry> {
        &self.registry
    }

    /// Coordinator counters.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub(crate) fn client(&self) -> &Arc<ParticipantClient> {
        &self.client
    }

    /// Number of live deadline triggers.
    pub fn scheduled_timeouts(&self) -> usize {
        self.timeouts.active_count()
    }

    /// Start a new LRA in `Active` status. A non-zero time limit arms a
    /// cancellation trigger at the resulting deadline.
    #[instrument(skip(self, client_id))]
    pub fn start(
        self: &Arc<Self>,
        parent_id: Option<LraId>,
        client_id: ClientId,
        time_limit_ms: u64,
    ) -> Result<LraId> {
        let deadline = lra_common::time::deadline_from_millis(time_limit_ms);
        let lra = Lra::new(client_id, parent_id, deadline);
        let id = lra.id;

        if let Some(parent) = parent_id {
            self.registry.with_lra(&parent, |parent_lra| {
                if parent_lra.status != LraStatus::Active {
                    return Err(LraError::PreconditionFailed {
                        lra_id: parent,
                        status: parent_lra.status,
                        operation: "nest a child LRA",
                    });
                }
                parent_lra.children.push(id);
                Ok(())
            })?;
        }

        self.registry.insert(lra);
        if let Some(deadline) = deadline {
            self.timeouts.schedule(Arc::downgrade(self), id, deadline);
        }
        self.metrics.lra_started();
        info!(lra_id = %id, parent_id = ?parent_id, "LRA started");
        Ok(id)
    }

    /// Enlist a participant. Inserts, or replaces an existing enlistment
    /// with the same endpoint identity; the stored enlistment's recovery
    /// token is returned either way.
    #[instrument(skip(self, endpoints, user_data))]
    pub fn join(
        &self,
        lra_id: LraId,
        endpoints: ParticipantEndpoints,
        compensate_time_limit: Option<DateTime<Utc>>,
        user_data: Option<Vec<u8>>,
    ) -> Result<RecoveryToken> {
        if !endpoints.has_end_phase_callback() {
            return Err(LraError::InvalidInput(
                "participant has no compensate or complete callback".to_string(),
            ));
        }

        self.registry.with_lra(&lra_id, |lra| {
            if lra.status != LraStatus::Active {
                return Err(LraError::PreconditionFailed {
                    lra_id,
                    status: lra.status,
                    operation: "join",
                });
            }
            let mut participant = Participant::new(lra_id, endpoints);
            participant.compensate_time_limit = compensate_time_limit;
            participant.user_data = user_data;
            let token = lra.upsert_participant(participant);
            info!(lra_id = %lra_id, token = %token, "participant joined");
            Ok(token)
        })
    }

    /// Replace the callback addresses of an existing enlistment.
    #[instrument(skip(self, endpoints))]
    pub fn update_participant(
        &self,
        lra_id: LraId,
        token: RecoveryToken,
        endpoints: ParticipantEndpoints,
    ) -> Result<()> {
        if !endpoints.has_end_phase_callback() {
            return Err(LraError::InvalidInput(
                "participant has no compensate or complete callback".to_string(),
            ));
        }
        self.registry.with_participant(&lra_id, &token, |p| {
            p.after_pending = endpoints.after.is_some();
            p.endpoints = endpoints;
            Ok(())
        })
    }

    /// Deregister a participant before the end phase. Removes the
    /// enlistment if it is still `Active`; a participant already being
    /// driven is left alone.
    #[instrument(skip(self))]
    pub fn leave(&self, lra_id: LraId, token: RecoveryToken) -> Result<()> {
        self.registry.with_lra(&lra_id, |lra| {
            if lra.status != LraStatus::Active {
                return Err(LraError::PreconditionFailed {
                    lra_id,
                    status: lra.status,
                    operation: "leave",
                });
            }
            match lra.participant(&token) {
                None => Err(LraError::ParticipantNotFound { lra_id, token }),
                Some(p) if p.status == ParticipantStatus::Active => {
                    lra.remove_participant(&token);
                    info!(lra_id = %lra_id, token = %token, "participant left");
                    Ok(())
                }
                Some(_) => Ok(()),
            }
        })
    }

    /// Current status of an LRA.
    pub fn status(&self, lra_id: LraId) -> Result<LraStatus> {
        self.registry.status(&lra_id)
    }

    /// Replace the LRA's deadline. The old trigger is atomically swapped
    /// for the new one so a stale trigger can never fire after renewal.
    #[instrument(skip(self))]
    pub fn renew_deadline(self: &Arc<Self>, lra_id: LraId, time_limit_ms: u64) -> Result<()> {
        let deadline = lra_common::time::deadline_from_millis(time_limit_ms);
        self.registry.with_lra(&lra_id, |lra| {
            if lra.status != LraStatus::Active {
                return Err(LraError::PreconditionFailed {
                    lra_id,
                    status: lra.status,
                    operation: "renew deadline",
                });
            }
            lra.deadline = deadline;
            Ok(())
        })?;

        match deadline {
            Some(deadline) => self.timeouts.schedule(Arc::downgrade(self), lra_id, deadline),
            None => self.timeouts.cancel(&lra_id),
        }
        info!(lra_id = %lra_id, deadline = ?deadline, "deadline renewed");
        Ok(())
    }

    /// Close the LRA: drive every participant through the complete
    /// protocol. Valid only from `Active`.
    #[instrument(skip(self))]
    pub async fn close(self: &Arc<Self>, lra_id: LraId) -> Result<LraStatus> {
        {
            let lock = self.locks.lock_for(lra_id);
            let _guard = lock.lock().await;
            self.registry.with_lra(&lra_id, |lra| {
                if lra.status != LraStatus::Active {
                    return Err(LraError::PreconditionFailed {
                        lra_id,
                        status: lra.status,
                        operation: "close",
                    });
                }
                lra.transition_to(LraStatus::Closing)?;
                Ok(())
            })?;
        }

        info!(lra_id = %lra_id, "LRA closing");
        self.end_lra(lra_id, Direction::Complete).await
    }

    /// Cancel the LRA: drive every participant through the compensate
    /// protocol. Valid from `Active` or `Closing` (cancel overrides
    /// close); a cancel already in flight is an idempotent no-op.
    #[instrument(skip(self))]
    pub async fn cancel(self: &Arc<Self>, lra_id: LraId) -> Result<LraStatus> {
        let proceed = {
            let lock = self.locks.lock_for(lra_id);
            let _guard = lock.lock().await;
            self.registry.with_lra(&lra_id, |lra| match lra.status {
                LraStatus::Active | LraStatus::Closing => {
                    lra.transition_to(LraStatus::Cancelling)?;
                    Ok(true)
                }
                LraStatus::Cancelling => Ok(false),
                status => Err(LraError::PreconditionFailed {
                    lra_id,
                    status,
                    operation: "cancel",
                }),
            })?
        };

        if !proceed {
            return Ok(LraStatus::Cancelling);
        }

        info!(lra_id = %lra_id, "LRA cancelling");
        self.end_lra(lra_id, Direction::Compensate).await
    }

    /// Drive an ending LRA: cascade into nested children, notify all
    /// participants concurrently, then settle the final status.
    async fn end_lra(self: &Arc<Self>, lra_id: LraId, direction: Direction) -> Result<LraStatus> {
        let lra = self.registry.get(&lra_id)?;

        for child_id in &lra.children {
            self.cascade_end(*child_id, direction).await;
        }

        let drives = lra
            .participants
            .iter()
            .map(|p| self.drive_participant(lra_id, p.recovery_token, direction, lra.parent_id, false));
        join_all(drives).await;

        self.finalize(lra_id).await
    }

    /// Propagate an end phase into one nested child.
    ///
    /// Closing closes active children. Cancelling cancels active children
    /// and, for children that already closed, compensates their retained
    /// participants: the parent absorbs delayed compensation for
    /// already-closed children.
    fn cascade_end(self: &Arc<Self>, child_id: LraId, direction: Direction) -> BoxFuture<'static, ()> {
        let this = Arc::clone(self);
        Box::pin(async move {
            let Ok(child) = this.registry.get(&child_id) else {
                return;
            };

            match (direction, child.status) {
                (Direction::Complete, LraStatus::Active) => {
                    if let Err(e) = this.close(child_id).await {
                        warn!(child_id = %child_id, error = %e, "failed to close nested child");
                    }
                }
                (Direction::Compensate, LraStatus::Active | LraStatus::Closing) => {
                    if let Err(e) = this.cancel(child_id).await {
                        warn!(child_id = %child_id, error = %e, "failed to cancel nested child");
                    }
                }
                (Direction::Compensate, LraStatus::Closed) => {
                    let drives = child.participants.iter().map(|p| {
                        this.drive_participant(
                            child_id,
                            p.recovery_token,
                            Direction::Compensate,
                            child.parent_id,
                            true,
                        )
                    });
                    join_all(drives).await;

                    for grandchild in &child.children {
                        this.cascade_end(*grandchild, direction).await;
                    }
                }
                _ => {}
            }
        })
    }

    /// Run one participant through the protocol for one direction:
    /// claim, invoke, classify, persist. Skips participants already
    /// terminal or claimed by a superseding direction.
    pub(crate) async fn drive_participant(
        &self,
        lra_id: LraId,
        token: RecoveryToken,
        direction: Direction,
        parent_id: Option<LraId>,
        reopen_completed: bool,
    ) {
        let claim = self.registry.with_lra(&lra_id, |lra| {
            let status_ok = match direction {
                Direction::Complete => lra.status == LraStatus::Closing,
                Direction::Compensate => lra.status == LraStatus::Cancelling || reopen_completed,
            };
            if !status_ok {
                return Ok(None);
            }

            let participant = lra.participant_mut(&token).ok_or(LraError::ParticipantNotFound {
                lra_id,
                token,
            })?;
            let in_progress = direction.in_progress();

            if participant.status == in_progress {
                // Retry of an in-flight notification.
            } else if participant.status == ParticipantStatus::Completed && !reopen_completed {
                // A top-level participant that completed before cancel
                // overrode close stays completed.
                return Ok(None);
            } else if participant.status.can_transition_to(in_progress) {
                participant.transition_to(in_progress)?;
            } else {
                return Ok(None);
            }
            Ok(Some(participant.clone()))
        });

        let participant = match claim {
            Ok(Some(participant)) => participant,
            Ok(None) => return,
            Err(e) => {
                debug!(lra_id = %lra_id, token = %token, error = %e, "participant not claimable");
                return;
            }
        };

        // A participant lacking the callback for this direction is
        // vacuously successful.
        if participant.endpoints.for_direction(direction).is_none() {
            self.persist_outcome(lra_id, token, direction, NotificationOutcome::Done);
            return;
        }

        let outcome = self.client.notify(&participant, direction, parent_id).await;
        if !matches!(outcome, NotificationOutcome::Ambiguous(_)) {
            let _ = self.registry.record_call(&lra_id, &token, direction);
        }
        self.metrics.notification_sent();
        self.persist_outcome(lra_id, token, direction, outcome);
    }

    /// Persist a classified notification outcome onto the participant
    /// record. In-progress and ambiguous outcomes leave the participant
    /// for the recovery engine.
    pub(crate) fn persist_outcome(
        &self,
        lra_id: LraId,
        token: RecoveryToken,
        direction: Direction,
        outcome: NotificationOutcome,
    ) {
        let next = match outcome {
            NotificationOutcome::Done => Some(direction.success()),
            NotificationOutcome::FailedTerminal(reported) => Some(reported),
            NotificationOutcome::InProgress => {
                debug!(lra_id = %lra_id, token = %token, "participant still {direction:?}, recovery will retry");
                None
            }
            NotificationOutcome::Ambiguous(reason) => {
                warn!(lra_id = %lra_id, token = %token, reason, "ambiguous outcome, left for recovery");
                None
            }
        };

        if let Some(next) = next {
            if let Err(e) = self.registry.set_participant_status(&lra_id, &token, next) {
                // A concurrent cancel superseded this direction.
                debug!(lra_id = %lra_id, token = %token, error = %e, "outcome superseded, not persisted");
            }
        }
    }

    /// Settle the final status of an ending LRA once every participant
    /// has reported in. Left in its ending state otherwise; the recovery
    /// engine converges it.
    pub(crate) async fn finalize(&self, lra_id: LraId) -> Result<LraStatus> {
        // The transition lock is released before any outbound delivery;
        // only the status change itself runs under it.
        let (final_status, newly_terminal, after_targets) = {
            let lock = self.locks.lock_for(lra_id);
            let _guard = lock.lock().await;

            self.registry.with_lra(&lra_id, |lra| {
                let direction = match lra.status {
                    LraStatus::Closing => Direction::Complete,
                    LraStatus::Cancelling => Direction::Compensate,
                    status => return Ok((status, false, Vec::new())),
                };

                if !lra.all_participants_terminal() {
                    return Ok((lra.status, false, Vec::new()));
                }

                // Any frozen failure counts against the LRA, including a
                // FailedToComplete left behind when cancel overrode an
                // in-flight close: that participant's work is neither
                // completed nor compensated.
                let any_failed = lra.participants.iter().any(|p| p.status.is_failed());
                let next = match (direction, any_failed) {
                    (Direction::Complete, false) => LraStatus::Closed,
                    (Direction::Complete, true) => LraStatus::FailedToClose,
                    (Direction::Compensate, false) => LraStatus::Cancelled,
                    (Direction::Compensate, true) => LraStatus::FailedToCancel,
                };
                lra.transition_to(next)?;

                let after_targets = lra
                    .participants
                    .iter()
                    .filter(|p| p.after_pending)
                    .filter_map(|p| {
                        p.endpoints
                            .after
                            .clone()
                            .map(|url| (p.recovery_token, url))
                    })
                    .collect();
                Ok((next, true, after_targets))
            })?
        };

        if newly_terminal {
            self.timeouts.cancel(&lra_id);
            match final_status {
                LraStatus::Closed => self.metrics.lra_closed(),
                LraStatus::Cancelled => self.metrics.lra_cancelled(),
                _ => self.metrics.lra_failed(),
            }
            info!(lra_id = %lra_id, status = %final_status, "LRA finished");
            self.deliver_after_notifications(lra_id, final_status, after_targets)
                .await;
        }

        Ok(final_status)
    }

    /// Notify after-LRA listeners of the final status. Undelivered
    /// listeners stay pending and are retried by the recovery engine.
    pub(crate) async fn deliver_after_notifications(
        &self,
        lra_id: LraId,
        final_status: LraStatus,
        targets: Vec<(RecoveryToken, String)>,
    ) {
        for (token, url) in targets {
            if self.client.notify_after(&url, lra_id, final_status).await {
                let _ = self.registry.with_participant(&lra_id, &token, |p| {
                    p.after_pending = false;
                    Ok(())
                });
            }
        }
    }

    /// Check whether an LRA's deadline has passed and it is still
    /// cancellable. Used by deadline triggers before going through the
    /// normal cancel path.
    pub(crate) fn deadline_expired(&self, lra_id: &LraId) -> bool {
        self.registry
            .get(lra_id)
            .map(|lra| {
                matches!(lra.status, LraStatus::Active | LraStatus::Closing)
                    && lra.is_deadline_expired()
            })
            .unwrap_or(false)
    }

    /// Drop every trace of a fully discharged LRA.
    pub(crate) fn purge(&self, lra_id: &LraId) {
        self.registry.remove(lra_id);
        self.locks.release(lra_id);
        self.timeouts.cancel(lra_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;

    fn create_test_coordinator() -> Arc<Coordinator> {
        Arc::new(Coordinator::new(&CoordinatorConfig::default()).unwrap())
    }

    /// Endpoints with only a compensate callback: complete is vacuous.
    fn compensate_only() -> ParticipantEndpoints {
        ParticipantEndpoints {
            compensate: Some("http://127.0.0.1:9/compensate".into()),
            ..Default::default()
        }
    }

    /// Endpoints with only a complete callback: compensate is vacuous.
    fn complete_only() -> ParticipantEndpoints {
        ParticipantEndpoints {
            complete: Some("http://127.0.0.1:9/complete".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_close_empty_lra() {
        let coordinator = create_test_coordinator();
        let id = coordinator
            .start(None, ClientId::new("test"), 0)
            .unwrap();
        assert_eq!(coordinator.close(id).await.unwrap(), LraStatus::Closed);
    }

    #[tokio::test]
    async fn test_close_is_not_repeatable() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        coordinator.close(id).await.unwrap();
        assert!(matches!(
            coordinator.close(id).await,
            Err(LraError::PreconditionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_after_close_is_rejected() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        coordinator.close(id).await.unwrap();
        assert!(matches!(
            coordinator.cancel(id).await,
            Err(LraError::PreconditionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_vacuous_complete() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        let token = coordinator.join(id, compensate_only(), None, None).unwrap();

        assert_eq!(coordinator.close(id).await.unwrap(), LraStatus::Closed);
        let lra = coordinator.registry().get(&id).unwrap();
        let p = lra.participant(&token).unwrap();
        assert_eq!(p.status, ParticipantStatus::Completed);
        assert_eq!(p.complete_calls, 0);
    }

    #[tokio::test]
    async fn test_vacuous_compensate() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        coordinator.join(id, complete_only(), None, None).unwrap();
        assert_eq!(coordinator.cancel(id).await.unwrap(), LraStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_failed_complete_surfaces_after_cancel_override() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        let token = coordinator.join(id, compensate_only(), None, None).unwrap();

        // A close already failed this participant when cancel takes over.
        coordinator
            .registry()
            .with_lra(&id, |lra| {
                lra.transition_to(LraStatus::Closing)?;
                let p = lra.participant_mut(&token).unwrap();
                p.transition_to(ParticipantStatus::Completing)?;
                p.transition_to(ParticipantStatus::FailedToComplete)?;
                Ok(())
            })
            .unwrap();

        // The frozen failure must surface on the LRA, never a clean
        // Cancelled.
        assert_eq!(
            coordinator.cancel(id).await.unwrap(),
            LraStatus::FailedToCancel
        );
    }

    #[tokio::test]
    async fn test_finalize_on_terminal_lra_counts_once() {
        use std::sync::atomic::Ordering;

        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        coordinator.close(id).await.unwrap();
        assert_eq!(
            coordinator.metrics().lras_closed.load(Ordering::Relaxed),
            1
        );

        // A sweep racing the close re-enters finalize on the terminal LRA.
        assert_eq!(coordinator.finalize(id).await.unwrap(), LraStatus::Closed);
        assert_eq!(
            coordinator.metrics().lras_closed.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_join_requires_active_lra() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        coordinator.close(id).await.unwrap();
        assert!(matches!(
            coordinator.join(id, compensate_only(), None, None),
            Err(LraError::PreconditionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_join_replaces_same_endpoint_identity() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        let first = coordinator.join(id, compensate_only(), None, None).unwrap();
        let second = coordinator.join(id, compensate_only(), None, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(coordinator.registry().get(&id).unwrap().participants.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_removes_participation() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        let token = coordinator.join(id, compensate_only(), None, None).unwrap();
        coordinator.leave(id, token).unwrap();
        assert!(coordinator.registry().get(&id).unwrap().participants.is_empty());
    }

    #[tokio::test]
    async fn test_start_with_unknown_parent() {
        let coordinator = create_test_coordinator();
        assert!(matches!(
            coordinator.start(Some(LraId::new()), ClientId::new("test"), 0),
            Err(LraError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_nested_close_retains_compensability() {
        let coordinator = create_test_coordinator();
        let parent = coordinator.start(None, ClientId::new("parent"), 0).unwrap();
        let child = coordinator
            .start(Some(parent), ClientId::new("child"), 0)
            .unwrap();
        let token = coordinator.join(child, complete_only(), None, None).unwrap();

        // Closing the child completes its participant vacuously but keeps
        // the record around.
        assert_eq!(coordinator.close(child).await.unwrap(), LraStatus::Closed);
        let child_lra = coordinator.registry().get(&child).unwrap();
        assert_eq!(
            child_lra.participant(&token).unwrap().status,
            ParticipantStatus::Completed
        );

        // Cancelling the parent reopens the child's participant for
        // compensation (vacuous here: no compensate callback).
        assert_eq!(coordinator.cancel(parent).await.unwrap(), LraStatus::Cancelled);
        let child_lra = coordinator.registry().get(&child).unwrap();
        assert_eq!(
            child_lra.participant(&token).unwrap().status,
            ParticipantStatus::Compensated
        );
        // The child LRA itself stays Closed.
        assert_eq!(child_lra.status, LraStatus::Closed);
    }

    #[tokio::test]
    async fn test_parent_close_closes_active_children() {
        let coordinator = create_test_coordinator();
        let parent = coordinator.start(None, ClientId::new("parent"), 0).unwrap();
        let child = coordinator
            .start(Some(parent), ClientId::new("child"), 0)
            .unwrap();

        assert_eq!(coordinator.close(parent).await.unwrap(), LraStatus::Closed);
        assert_eq!(coordinator.status(child).unwrap(), LraStatus::Closed);
    }

    #[tokio::test]
    async fn test_renew_deadline_requires_active() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 0).unwrap();
        coordinator.close(id).await.unwrap();
        assert!(matches!(
            coordinator.renew_deadline(id, 1000),
            Err(LraError::PreconditionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_deadline_cancels_lra() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 50).unwrap();
        assert_eq!(coordinator.scheduled_timeouts(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(coordinator.status(id).unwrap(), LraStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_renew_replaces_trigger() {
        let coordinator = create_test_coordinator();
        let id = coordinator.start(None, ClientId::new("test"), 100).unwrap();
        coordinator.renew_deadline(id, 60_000).unwrap();

        // The original 100ms trigger must not fire after renewal.
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(coordinator.status(id).unwrap(), LraStatus::Active);
    }
}
