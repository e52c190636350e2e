//! Nullable store: thread-safe in-memory snapshot storage for testing.

use std::sync::Mutex;

use prism_store::{Snapshot, SnapshotStore, StoreError};

use crate::lock;

#[derive(Default)]
struct State {
    snapshot: Option<Snapshot>,
    saves: usize,
    fail_saves: bool,
}

/// Keeps the last saved snapshot in memory.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<State>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `snapshot`, as after a previous run.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        lock(&store.state).snapshot = Some(snapshot);
        store
    }

    pub fn saved(&self) -> Option<Snapshot> {
        lock(&self.state).snapshot.clone()
    }

    pub fn save_count(&self) -> usize {
        lock(&self.state).saves
    }

    /// Make every save fail with a backend error.
    pub fn fail_saves(&self, fail: bool) {
        lock(&self.state).fail_saves = fail;
    }
}

impl SnapshotStore for NullStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(lock(&self.state).snapshot.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.fail_saves {
            return Err(StoreError::Backend("disk full".into()));
        }
        state.snapshot = Some(snapshot.clone());
        state.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_snapshot() {
        let store = NullStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&Snapshot::new()).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap(), Some(Snapshot::new()));

        store.fail_saves(true);
        assert!(store.save(&Snapshot::new()).is_err());
        assert_eq!(store.save_count(), 1);
    }
}
