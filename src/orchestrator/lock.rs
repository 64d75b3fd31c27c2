use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::StudyError;

/// Application-level exclusion for structural mutations: at most one
/// in-flight mutation per node subtree. Not a database lock; held only for
/// the duration of one request.
#[derive(Debug, Default)]
pub struct LockCoordinator {
    locked: Mutex<HashSet<Uuid>>,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every given node id as locked, failing fast with `Busy` when any
    /// of them already is. The returned guard releases all of them on drop,
    /// on success and error paths alike.
    pub fn acquire(
        self: &Arc<Self>,
        node_ids: Vec<Uuid>,
    ) -> Result<SubtreeLockGuard, StudyError> {
        let mut locked = self.locked.lock();
        if let Some(busy) = node_ids.iter().find(|id| locked.contains(id)) {
            return Err(StudyError::Busy(format!(
                "subtree containing node {busy} has a mutation in flight"
            )));
        }
        locked.extend(node_ids.iter().copied());
        debug!(count = node_ids.len(), "subtree locked");
        Ok(SubtreeLockGuard {
            coordinator: Arc::clone(self),
            node_ids,
        })
    }

    pub fn is_locked(&self, node_id: Uuid) -> bool {
        self.locked.lock().contains(&node_id)
    }
}

/// RAII token for a locked subtree.
#[derive(Debug)]
pub struct SubtreeLockGuard {
    coordinator: Arc<LockCoordinator>,
    node_ids: Vec<Uuid>,
}

impl Drop for SubtreeLockGuard {
    fn drop(&mut self) {
        let mut locked = self.coordinator.locked.lock();
        for id in &self.node_ids {
            locked.remove(id);
        }
        debug!(count = self.node_ids.len(), "subtree unlocked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_acquire_is_busy() {
        let coordinator = Arc::new(LockCoordinator::new());
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let guard = coordinator.acquire(vec![a, b]).unwrap();
        assert!(matches!(
            coordinator.acquire(vec![b, c]).unwrap_err(),
            StudyError::Busy(_)
        ));
        // disjoint subtrees mutate in parallel
        let other = coordinator.acquire(vec![c]).unwrap();
        drop(other);
        drop(guard);
        assert!(!coordinator.is_locked(a));
    }

    #[test]
    fn guard_releases_on_panic_unwind() {
        let coordinator = Arc::new(LockCoordinator::new());
        let id = Uuid::new_v4();
        let held = coordinator.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = held.acquire(vec![id]).unwrap();
            panic!("mutation failed");
        }));
        assert!(result.is_err());
        assert!(!coordinator.is_locked(id));
        assert!(coordinator.acquire(vec![id]).is_ok());
    }
}
