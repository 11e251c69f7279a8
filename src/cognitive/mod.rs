//! Cognitive module: reasoning modes, their strategies, and mode routing.
//! Deterministic, dependency-free heuristics.

pub mod abductive;
pub mod deductive;
pub mod inductive;
pub mod routing;
pub mod strategy;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strategy::Strategy;

pub use routing::{ModeRoutingResult, route_mode};

/// Closed set of reasoning modes a fork can be produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    Deductive,
    Inductive,
    Abductive,
}

static STRATEGIES: Lazy<[Arc<dyn Strategy + Send + Sync>; 3]> = Lazy::new(|| {
    [
        Arc::new(deductive::Deductive),
        Arc::new(inductive::Inductive),
        Arc::new(abductive::Abductive),
    ]
});

impl ReasoningMode {
    pub const ALL: [ReasoningMode; 3] = [
        ReasoningMode::Deductive,
        ReasoningMode::Inductive,
        ReasoningMode::Abductive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningMode::Deductive => "deductive",
            ReasoningMode::Inductive => "inductive",
            ReasoningMode::Abductive => "abductive",
        }
    }

    pub fn strategy(self) -> Arc<dyn Strategy + Send + Sync> {
        Arc::clone(&STRATEGIES[self as usize])
    }

    /// Starting confidence before jitter and context adjustments.
    pub fn base_confidence(self) -> f64 {
        match self {
            ReasoningMode::Deductive => 0.75,
            ReasoningMode::Inductive => 0.60,
            ReasoningMode::Abductive => 0.55,
        }
    }

    /// Prefix used when synthesising hypothesis text.
    pub fn prefix(self) -> &'static str {
        match self {
            ReasoningMode::Deductive => "Analysis:",
            ReasoningMode::Inductive => "Pattern synthesis:",
            ReasoningMode::Abductive => "Best explanation:",
        }
    }
}

impl std::fmt::Display for ReasoningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::{ContextItem, ContextSource};

    fn ctx(content: &str) -> ContextItem {
        ContextItem {
            key: content.to_string(),
            content: content.to_string(),
            relevance: 0.8,
            source: ContextSource::Semantic,
        }
    }

    #[test]
    fn test_strategy_dispatch_matches_mode() {
        for mode in ReasoningMode::ALL {
            assert_eq!(mode.strategy().mode(), mode);
        }
    }

    #[test]
    fn test_every_strategy_returns_steps_without_context() {
        for mode in ReasoningMode::ALL {
            let steps = mode.strategy().reason("", &[]);
            assert!(!steps.is_empty(), "{} produced no steps", mode);
        }
    }

    #[test]
    fn test_trace_wording_per_mode() {
        let context = vec![ctx("first fact"), ctx("second fact"), ctx("third fact")];
        let d = ReasoningMode::Deductive.strategy().reason("Q", &context);
        assert_eq!(d[0], "Given: first fact");
        assert_eq!(d[1], "Given: second fact");
        let i = ReasoningMode::Inductive.strategy().reason("Q", &context);
        assert_eq!(i[0], "Pattern observed: first fact");
        let a = ReasoningMode::Abductive.strategy().reason("Q", &context);
        assert_eq!(a[0], "Observation: first fact");
        assert!(!a.iter().any(|s| s.contains("second fact")));
    }

    #[test]
    fn test_mode_serde_is_snake_case() {
        let json = serde_json::to_string(&ReasoningMode::Abductive).unwrap();
        assert_eq!(json, "\"abductive\"");
    }
}
