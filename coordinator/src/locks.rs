//! Per-LRA transition locks.
//!
//! State transitions on one LRA are serialized through its lock so two
//! concurrent close/cancel calls can never double-drive participants.
//! The lock is held only across the transition itself, never across
//! outbound participant calls.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use lra_common::LraId;

/// Table of per-LRA transition locks.
pub struct TransitionLocks {
    locks: DashMap<LraId, Arc<Mutex<()>>>,
}

impl TransitionLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Get the lock for an LRA, creating it on first use.
    pub fn lock_for(&self, id: LraId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry once its LRA has been removed.
    pub fn release(&self, id: &LraId) {
        self.locks.remove(id);
    }

    /// Number of live lock entries.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for TransitionLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_lra_gets_same_lock() {
        let locks = TransitionLocks::new();
        let id = LraId::new();

        let a = locks.lock_for(id);
        let b = locks.lock_for(id);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_lock_serializes_access() {
        let locks = TransitionLocks::new();
        let id = LraId::new();

        let lock = locks.lock_for(id);
        let guard = lock.lock().await;

        let other = locks.lock_for(id);
        assert!(other.try_lock().is_err());

        drop(guard);
        assert!(other.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_release() {
        let locks = TransitionLocks::new();
        let id = LraId::new();
        locks.lock_for(id);
        locks.release(&id);
        assert!(locks.is_empty());
    }
}
