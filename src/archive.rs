//! Fork archive: every evaluated fork, rejected ones included, keyed by id.
//!
//! Archived forks are never modified. The in-memory archive is bounded
//! (`DEFAULT_ARCHIVE_CAPACITY` forks) and evicts the oldest first, so a long
//! lineage can outlive its root. `lineage` reports that case as
//! `Lineage::Evicted` instead of silently returning a shorter chain.

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;

use crate::fork::{Fork, ForkId};

pub const DEFAULT_ARCHIVE_CAPACITY: usize = 10_000;

/// Ancestry of an archived fork through `parent_id`, nearest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lineage {
    /// The chain ends at a fork with no parent.
    Complete(Vec<Fork>),
    /// `missing` has been evicted; `chain` ends with its child.
    Evicted { chain: Vec<Fork>, missing: ForkId },
}

impl Lineage {
    pub fn forks(&self) -> &[Fork] {
        match self {
            Lineage::Complete(chain) | Lineage::Evicted { chain, .. } => chain,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Lineage::Complete(_))
    }
}

/// Destination for forks once a cycle has gated them.
pub trait ForkSink: Send + Sync {
    fn archive(&self, forks: &[Fork]);
    fn get(&self, id: ForkId) -> Option<Fork>;
    /// `id` followed by its ancestors. `None` when `id` itself is not archived.
    fn lineage(&self, id: ForkId) -> Option<Lineage>;
    /// Up to `n` most recently archived forks, newest first.
    fn recent(&self, n: usize) -> Vec<Fork>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-memory archive. The oldest forks are evicted past `capacity`;
/// a fork that has been evicted can no longer be validated.
pub struct InMemoryForkArchive {
    forks: Mutex<LruCache<ForkId, Fork>>,
}

impl InMemoryForkArchive {
    pub fn new(capacity: usize) -> Self {
        Self {
            forks: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }
}

impl Default for InMemoryForkArchive {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_CAPACITY)
    }
}

impl ForkSink for InMemoryForkArchive {
    fn archive(&self, forks: &[Fork]) {
        let mut cache = self.forks.lock();
        for fork in forks {
            if let Some((evicted, _)) = cache.push(fork.id(), fork.clone()) {
                if evicted != fork.id() {
                    tracing::debug!("archive full, evicted fork {}", evicted);
                }
            }
        }
    }

    fn get(&self, id: ForkId) -> Option<Fork> {
        // peek keeps archive order tied to insertion, not lookups
        self.forks.lock().peek(&id).cloned()
    }

    fn lineage(&self, id: ForkId) -> Option<Lineage> {
        let cache = self.forks.lock();
        let mut chain = vec![cache.peek(&id)?.clone()];
        let mut seen = HashSet::from([id]);
        while let Some(parent) = chain.last().and_then(|f| f.parent_id()) {
            if !seen.insert(parent) {
                tracing::warn!("fork lineage loops back to {}", parent);
                break;
            }
            match cache.peek(&parent) {
                Some(fork) => chain.push(fork.clone()),
                None => return Some(Lineage::Evicted { chain, missing: parent }),
            }
        }
        Some(Lineage::Complete(chain))
    }

    fn recent(&self, n: usize) -> Vec<Fork> {
        self.forks.lock().iter().take(n).map(|(_, f)| f.clone()).collect()
    }

    fn len(&self) -> usize {
        self.forks.lock().len()
    }
}
