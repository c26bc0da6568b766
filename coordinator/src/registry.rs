//! The LRA registry: the single source of truth for LRA records and
//! their participant enlistments.
//!
//! All components read and mutate LRA state through this API; nothing
//! keeps a private copy. Mutation happens inside short closures executed
//! under the record's map entry, so each individual read-modify-write is
//! atomic. Closures must not block or call back into the registry.

use dashmap::DashMap;
use tracing::info;

use lra_common::{
    Direction, Lra, LraError, LraId, LraStatus, Participant, ParticipantStatus, RecoveryToken,
    Result,
};

/// Durable store of LRA records.
pub struct LraRegistry {
    lras: DashMap<LraId, Lra>,
}

impl LraRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            lras: DashMap::new(),
        }
    }

    /// Insert a new LRA record.
    pub fn insert(&self, lra: Lra) {
        info!(lra_id = %lra.id, client_id = %lra.client_id, "LRA registered");
        self.lras.insert(lra.id, lra);
    }

    /// Check if an LRA exists.
    pub fn contains(&self, id: &LraId) -> bool {
        self.lras.contains_key(id)
    }

    /// Get a snapshot of one LRA record.
    pub fn get(&self, id: &LraId) -> Result<Lra> {
        self.lras
            .get(id)
            .map(|l| l.clone())
            .ok_or(LraError::NotFound(*id))
    }

    /// Get the current status of an LRA.
    pub fn status(&self, id: &LraId) -> Result<LraStatus> {
        self.lras
            .get(id)
            .map(|l| l.status)
            .ok_or(LraError::NotFound(*id))
    }

    /// Run a mutation against one LRA record.
    pub fn with_lra<T>(&self, id: &LraId, f: impl FnOnce(&mut Lra) -> Result<T>) -> Result<T> {
        let mut entry = self.lras.get_mut(id).ok_or(LraError::NotFound(*id))?;
        f(entry.value_mut())
    }

    /// Run a mutation against one participant record.
    pub fn with_participant<T>(
        &self,
        id: &LraId,
        token: &RecoveryToken,
        f: impl FnOnce(&mut Participant) -> Result<T>,
    ) -> Result<T> {
        self.with_lra(id, |lra| {
            let participant = lra
                .participant_mut(token)
                .ok_or(LraError::ParticipantNotFound {
                    lra_id: *id,
                    token: *token,
                })?;
            f(participant)
        })
    }

    /// Transition one participant, enforcing its state machine.
    pub fn set_participant_status(
        &self,
        id: &LraId,
        token: &RecoveryToken,
        next: ParticipantStatus,
    ) -> Result<()> {
        self.with_participant(id, token, |p| {
            p.transition_to(next)?;
            Ok(())
        })
    }

    /// Record one delivered notification on a participant's counters.
    pub fn record_call(&self, id: &LraId, token: &RecoveryToken, direction: Direction) -> Result<()> {
        self.with_participant(id, token, |p| {
            p.record_call(direction);
            Ok(())
        })
    }

    /// Remove a participant enlistment. Returns the removed record.
    pub fn remove_participant(&self, id: &LraId, token: &RecoveryToken) -> Result<Participant> {
        self.with_lra(id, |lra| {
            lra.remove_participant(token)
                .ok_or(LraError::ParticipantNotFound {
                    lra_id: *id,
                    token: *token,
                })
        })
    }

    /// Remove an LRA record entirely. Only called once the LRA is terminal
    /// and all bookkeeping obligations are discharged.
    pub fn remove(&self, id: &LraId) -> Option<Lra> {
        let removed = self.lras.remove(id).map(|(_, lra)| lra);
        if removed.is_some() {
            info!(lra_id = %id, "LRA removed from registry");
        }
        removed
    }

    /// Snapshot all LRA records, sorted by id so sweeps enumerate
    /// deterministically.
    pub fn snapshot(&self) -> Vec<Lra> {
        let mut lras: Vec<Lra> = self.lras.iter().map(|e| e.value().clone()).collect();
        lras.sort_by_key(|l| l.id);
        lras
    }

    /// Number of tracked LRAs.
    pub fn len(&self) -> usize {
        self.lras.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.lras.is_empty()
    }
}

impl Default for LraRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lra_common::{ClientId, ParticipantEndpoints};

    fn create_test_registry() -> (LraRegistry, LraId) {
        let registry = LraRegistry::new();
        let lra = Lra::new(ClientId::new("test"), None, None);
        let id = lra.id;
        registry.insert(lra);
        (registry, id)
    }

    fn create_test_endpoints() -> ParticipantEndpoints {
        ParticipantEndpoints {
            compensate: Some("http://p/compensate".into()),
            complete: Some("http://p/complete".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_unknown_lra() {
        let registry = LraRegistry::new();
        assert!(matches!(
            registry.get(&LraId::new()),
            Err(LraError::NotFound(_))
        ));
    }

    #[test]
    fn test_participant_status_transition() {
        let (registry, id) = create_test_registry();
        let token = registry
            .with_lra(&id, |lra| {
                Ok(lra.upsert_participant(Participant::new(id, create_test_endpoints())))
            })
            .unwrap();

        registry
            .set_participant_status(&id, &token, ParticipantStatus::Completing)
            .unwrap();
        registry
            .set_participant_status(&id, &token, ParticipantStatus::Completed)
            .unwrap();

        // Completed -> FailedToComplete is not a legal move.
        assert!(registry
            .set_participant_status(&id, &token, ParticipantStatus::FailedToComplete)
            .is_err());
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = LraRegistry::new();
        for _ in 0..5 {
            registry.insert(Lra::new(ClientId::new("test"), None, None));
        }
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 5);
        assert!(snapshot.windows(2).all(|w| w[0].id <= w[1].id));
    }

    #[test]
    fn test_remove_participant() {
        let (registry, id) = create_test_registry();
        let token = registry
            .with_lra(&id, |lra| {
                Ok(lra.upsert_participant(Participant::new(id, create_test_endpoints())))
            })
            .unwrap();

        registry.remove_participant(&id, &token).unwrap();
        assert!(registry.remove_participant(&id, &token).is_err());
    }
}
