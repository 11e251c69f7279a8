//! Versioned, single-writer store of cognitive states.
//!
//! Published states are immutable `Arc` snapshots kept in a bounded arena.
//! The active version number is the only mutable cell; it moves only inside
//! `commit`, under the write lock.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use super::params::CognitiveParams;
use crate::error::{ForkMindError, Result};

/// Number of versions retained for rollback.
pub const HISTORY_DEPTH: usize = 10;

/// Why a version exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateOrigin {
    Initial,
    Evolution,
    Learning,
    Manual,
    Revert { from: u64 },
}

/// One published configuration version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveState {
    pub version: u64,
    pub parent_version: Option<u64>,
    pub params: CognitiveParams,
    pub origin: StateOrigin,
    pub created_at: DateTime<Utc>,
}

struct StoreInner {
    history: VecDeque<Arc<CognitiveState>>,
    active: u64,
    next_version: u64,
}

pub struct StateStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
}

impl StateStore {
    pub fn new(initial: CognitiveParams) -> Self {
        Self::with_capacity(initial, HISTORY_DEPTH)
    }

    pub fn with_capacity(initial: CognitiveParams, capacity: usize) -> Self {
        let first = Arc::new(CognitiveState {
            version: 1,
            parent_version: None,
            params: initial,
            origin: StateOrigin::Initial,
            created_at: Utc::now(),
        });
        let mut history = VecDeque::with_capacity(capacity + 1);
        history.push_back(first);
        Self {
            inner: RwLock::new(StoreInner {
                history,
                active: 1,
                next_version: 2,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of the active state. A cycle calls this once and keeps the
    /// `Arc` for its whole duration.
    pub fn pin(&self) -> Arc<CognitiveState> {
        let inner = self.inner.read();
        Self::find(&inner, inner.active)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&inner.history[inner.history.len() - 1]))
    }

    pub fn active_version(&self) -> u64 {
        self.inner.read().active
    }

    pub fn history_depth(&self) -> usize {
        self.inner.read().history.len()
    }

    /// Retained version numbers, oldest first.
    pub fn versions(&self) -> Vec<u64> {
        self.inner.read().history.iter().map(|s| s.version).collect()
    }

    pub fn get(&self, version: u64) -> Option<Arc<CognitiveState>> {
        let inner = self.inner.read();
        Self::find(&inner, version).cloned()
    }

    /// Publishes `params` as a new active version built on `base_version`.
    ///
    /// Fails with `StaleBase` if another commit moved the active pointer since
    /// the proposal was built. Evicts the oldest retained version once the
    /// arena exceeds its capacity.
    pub(crate) fn commit(
        &self,
        base_version: u64,
        params: CognitiveParams,
        origin: StateOrigin,
    ) -> Result<Arc<CognitiveState>> {
        let mut inner = self.inner.write();
        if inner.active != base_version {
            return Err(ForkMindError::StaleBase {
                expected: base_version,
                active: inner.active,
            });
        }
        let version = inner.next_version;
        let state = Arc::new(CognitiveState {
            version,
            parent_version: Some(base_version),
            params,
            origin,
            created_at: Utc::now(),
        });
        inner.history.push_back(Arc::clone(&state));
        while inner.history.len() > self.capacity {
            if let Some(evicted) = inner.history.pop_front() {
                tracing::debug!("evicted cognitive state v{} from history", evicted.version);
            }
        }
        inner.active = version;
        inner.next_version += 1;
        Ok(state)
    }

    fn find(inner: &StoreInner, version: u64) -> Option<&Arc<CognitiveState>> {
        inner.history.iter().find(|s| s.version == version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_active() {
        let store = StateStore::new(CognitiveParams::default());
        assert_eq!(store.active_version(), 1);
        assert_eq!(store.history_depth(), 1);
        assert_eq!(store.pin().origin, StateOrigin::Initial);
    }

    #[test]
    fn test_commit_moves_active_and_keeps_pinned_snapshot() {
        let store = StateStore::new(CognitiveParams::default());
        let pinned = store.pin();
        let mut p = CognitiveParams::default();
        p.alpha = 0.02;
        store.commit(1, p, StateOrigin::Manual).unwrap();
        assert_eq!(store.active_version(), 2);
        assert_eq!(pinned.params.alpha, 0.01);
        assert_eq!(store.pin().params.alpha, 0.02);
        assert_eq!(store.pin().parent_version, Some(1));
    }

    #[test]
    fn test_stale_base_rejected_without_change() {
        let store = StateStore::new(CognitiveParams::default());
        store
            .commit(1, CognitiveParams::default(), StateOrigin::Manual)
            .unwrap();
        let err = store
            .commit(1, CognitiveParams::default(), StateOrigin::Manual)
            .unwrap_err();
        assert!(matches!(err, ForkMindError::StaleBase { expected: 1, active: 2 }));
        assert_eq!(store.active_version(), 2);
        assert_eq!(store.history_depth(), 2);
    }

    #[test]
    fn test_eleventh_commit_evicts_exactly_oldest() {
        let store = StateStore::new(CognitiveParams::default());
        for _ in 0..9 {
            let base = store.active_version();
            store
                .commit(base, CognitiveParams::default(), StateOrigin::Manual)
                .unwrap();
        }
        assert_eq!(store.versions(), (1..=10).collect::<Vec<_>>());
        let base = store.active_version();
        store
            .commit(base, CognitiveParams::default(), StateOrigin::Manual)
            .unwrap();
        assert_eq!(store.versions(), (2..=11).collect::<Vec<_>>());
        assert!(store.get(1).is_none());
        assert_eq!(store.history_depth(), HISTORY_DEPTH);
        assert!(store.versions().contains(&store.active_version()));
    }
}
