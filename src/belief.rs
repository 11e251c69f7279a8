//! Belief store: facts the core can draw context from.
//!
//! The core treats a `ContextSnapshot` as opaque input to the generator. Each
//! item is tagged with where it came from so the generator can weight
//! semantic matches against graph (key-linked) matches using the pinned
//! retrieval balance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use crate::error::{ForkMindError, Result};
use crate::utils::text::{term_counts, term_similarity, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    /// Matched on the fact's content.
    Semantic,
    /// Matched through the fact's key.
    Graph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub key: String,
    pub content: String,
    /// Raw match strength in [0, 1] before retrieval balance is applied.
    pub relevance: f64,
    pub source: ContextSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub query: String,
    pub items: Vec<ContextItem>,
    pub total_facts: usize,
}

impl ContextSnapshot {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            items: Vec::new(),
            total_facts: 0,
        }
    }

    pub fn from_items(query: impl Into<String>, items: Vec<ContextItem>) -> Self {
        let total_facts = items.len();
        Self {
            query: query.into(),
            items,
            total_facts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items ordered by relevance after weighting semantic matches by
    /// `balance` and graph matches by `1 - balance`. Ties fall back to key
    /// order so the result never depends on insertion order.
    pub fn weighted(&self, balance: f64) -> Vec<ContextItem> {
        let balance = if balance.is_finite() {
            balance.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let mut items: Vec<ContextItem> = self
            .items
            .iter()
            .map(|item| {
                let w = match item.source {
                    ContextSource::Semantic => balance,
                    ContextSource::Graph => 1.0 - balance,
                };
                ContextItem {
                    relevance: item.relevance * w,
                    ..item.clone()
                }
            })
            .collect();
        items.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| a.key.cmp(&b.key))
        });
        items
    }
}

/// A remembered fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub stored_at: DateTime<Utc>,
}

#[async_trait]
pub trait BeliefStore: Send + Sync {
    async fn remember(&self, key: &str, value: &str, confidence: f64) -> Result<()>;
    async fn recall(&self, key: &str) -> Result<Option<Belief>>;
    async fn retrieve_context(&self, query: &str) -> Result<ContextSnapshot>;
    async fn len(&self) -> usize;
}

/// Bounded in-memory belief store. Least recently used facts are evicted
/// once `capacity` is reached.
pub struct InMemoryBeliefStore {
    facts: Mutex<LruCache<String, Belief>>,
    top_k: usize,
}

impl InMemoryBeliefStore {
    pub fn new(capacity: usize, top_k: usize) -> Self {
        Self {
            facts: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            top_k: top_k.max(1),
        }
    }

    fn score(
        query_terms: &[String],
        query_vec: &BTreeMap<String, f64>,
        belief: &Belief,
    ) -> Option<ContextItem> {
        let semantic = term_similarity(query_vec, &term_counts(&belief.value));

        let key_terms = tokenize(&belief.key);
        let graph = if key_terms.is_empty() {
            0.0
        } else {
            let linked = key_terms.iter().filter(|t| query_terms.contains(t)).count();
            linked as f64 / key_terms.len() as f64
        };

        if semantic <= 0.0 && graph <= 0.0 {
            return None;
        }
        let confidence = belief.confidence.clamp(0.0, 1.0);
        let (relevance, source) = if semantic >= graph {
            (semantic, ContextSource::Semantic)
        } else {
            (graph, ContextSource::Graph)
        };
        Some(ContextItem {
            key: belief.key.clone(),
            content: belief.value.clone(),
            relevance: (relevance * confidence).clamp(0.0, 1.0),
            source,
        })
    }
}

impl Default for InMemoryBeliefStore {
    fn default() -> Self {
        Self::new(1024, 3)
    }
}

#[async_trait]
impl BeliefStore for InMemoryBeliefStore {
    async fn remember(&self, key: &str, value: &str, confidence: f64) -> Result<()> {
        if key.trim().is_empty() {
            return Err(ForkMindError::Belief {
                message: "belief key must not be empty".into(),
            });
        }
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            return Err(ForkMindError::Belief {
                message: format!("confidence for '{}' is not finite", key),
            });
        };
        let belief = Belief {
            key: key.to_string(),
            value: value.to_string(),
            confidence,
            stored_at: Utc::now(),
        };
        if let Some((evicted, _)) = self.facts.lock().push(key.to_string(), belief) {
            if evicted != key {
                tracing::debug!("belief store full, evicted '{}'", evicted);
            }
        }
        Ok(())
    }

    async fn recall(&self, key: &str) -> Result<Option<Belief>> {
        Ok(self.facts.lock().get(key).cloned())
    }

    async fn retrieve_context(&self, query: &str) -> Result<ContextSnapshot> {
        let query_terms = tokenize(query);
        let query_vec = term_counts(query);
        let facts = self.facts.lock();
        let total_facts = facts.len();
        let mut items: Vec<ContextItem> = facts
            .iter()
            .filter_map(|(_, belief)| Self::score(&query_terms, &query_vec, belief))
            .collect();
        drop(facts);
        items.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| a.key.cmp(&b.key))
        });
        items.truncate(self.top_k);
        Ok(ContextSnapshot {
            query: query.to_string(),
            items,
            total_facts,
        })
    }

    async fn len(&self) -> usize {
        self.facts.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remember_and_recall() {
        let store = InMemoryBeliefStore::default();
        store.remember("safety", "Safety means avoiding harm", 0.9).await.unwrap();
        let belief = store.recall("safety").await.unwrap().unwrap();
        assert_eq!(belief.value, "Safety means avoiding harm");
        assert!(store.recall("missing").await.unwrap().is_none());
        assert!(store.remember(" ", "x", 1.0).await.is_err());
        assert!(store.remember("k", "x", f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_retrieve_context_ranks_and_limits() {
        let store = InMemoryBeliefStore::new(16, 2);
        store.remember("safety", "Safety means avoiding harm to people", 1.0).await.unwrap();
        store.remember("weather", "It rains in spring", 1.0).await.unwrap();
        store.remember("policy", "Safety policy requires review", 0.5).await.unwrap();
        let snap = store.retrieve_context("What is safety?").await.unwrap();
        assert_eq!(snap.total_facts, 3);
        assert_eq!(snap.items.len(), 2);
        assert_eq!(snap.items[0].key, "safety");
        assert!(snap.items.iter().all(|i| i.key != "weather"));
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let store = InMemoryBeliefStore::new(2, 3);
        store.remember("a", "alpha", 1.0).await.unwrap();
        store.remember("b", "beta", 1.0).await.unwrap();
        store.remember("c", "gamma", 1.0).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert!(store.recall("a").await.unwrap().is_none());
    }

    #[test]
    fn test_weighted_applies_balance() {
        let snap = ContextSnapshot::from_items(
            "q",
            vec![
                ContextItem {
                    key: "s".into(),
                    content: "semantic".into(),
                    relevance: 0.5,
                    source: ContextSource::Semantic,
                },
                ContextItem {
                    key: "g".into(),
                    content: "graph".into(),
                    relevance: 0.5,
                    source: ContextSource::Graph,
                },
            ],
        );
        assert_eq!(snap.weighted(0.8)[0].key, "s");
        assert_eq!(snap.weighted(0.2)[0].key, "g");
        assert_eq!(snap.weighted(0.5)[0].key, "g");
    }
}
