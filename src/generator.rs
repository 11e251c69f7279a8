//! Fork Generator: one input plus a context snapshot becomes N forks.
//!
//! Mode order is the routed primary mode followed by the remaining modes by
//! descending priority weight. Depths beyond three repeat the modes with an
//! increasing `variant`, which shifts retrieval emphasis and rotates the
//! context so repeated modes still reason over different evidence.

use uuid::Uuid;

use crate::belief::{ContextItem, ContextSnapshot};
use crate::cognitive::{ReasoningMode, route_mode};
use crate::fork::{Fork, ForkDraft, ForkId, ReasoningTrace};
use crate::state::{CognitiveParams, CognitiveState};
use crate::utils::math::hash_unit;

/// Confidence removed when no context was available.
pub const EMPTY_CONTEXT_PENALTY: f64 = 0.15;
/// Confidence removed per variant index.
pub const VARIANT_PENALTY: f64 = 0.02;
/// Half-width of the deterministic confidence jitter.
pub const JITTER: f64 = 0.05;
/// Retrieval balance shift applied per variant index.
pub const VARIANT_BALANCE_SHIFT: f64 = 0.35;

/// Reasoning modes in generation order: `primary` first, then the rest by
/// descending priority weight, ties in enum order.
pub fn mode_order(primary: ReasoningMode, params: &CognitiveParams) -> Vec<ReasoningMode> {
    let mut rest: Vec<ReasoningMode> = ReasoningMode::ALL
        .into_iter()
        .filter(|m| *m != primary)
        .collect();
    rest.sort_by(|a, b| {
        params
            .mode_weights
            .get(*b)
            .total_cmp(&params.mode_weights.get(*a))
            .then_with(|| a.cmp(b))
    });
    let mut order = vec![primary];
    order.extend(rest);
    order
}

/// Retrieval balance used by a given variant. Variant 0 uses the pinned value.
pub fn variant_balance(balance: f64, variant: u32) -> f64 {
    if variant == 0 {
        return balance;
    }
    let shifted = balance + VARIANT_BALANCE_SHIFT * variant as f64;
    shifted - shifted.floor()
}

fn variant_context(context: &ContextSnapshot, balance: f64, variant: u32) -> Vec<ContextItem> {
    let mut items = context.weighted(variant_balance(balance, variant));
    if !items.is_empty() {
        let len = items.len();
        items.rotate_left(variant as usize % len);
    }
    items
}

fn jitter(input: &str, mode: ReasoningMode, variant: u32, config_version: u64) -> f64 {
    let u = hash_unit(&[
        input.as_bytes(),
        mode.as_str().as_bytes(),
        &variant.to_le_bytes(),
        &config_version.to_le_bytes(),
    ]);
    (u * 2.0 - 1.0) * JITTER
}

fn synthesize(mode: ReasoningMode, trace: &ReasoningTrace, input: &str) -> String {
    let input = input.trim();
    let target = if input.is_empty() { "(empty input)" } else { input };
    format!(
        "{} Based on {} -> responding to: {}",
        mode.prefix(),
        trace.summary(3),
        target
    )
}

/// Produce exactly `depth.max(1)` forks for `input` under the pinned `state`.
///
/// Total over every input, including empty text and empty context.
pub fn generate(
    input: &str,
    context: &ContextSnapshot,
    depth: usize,
    state: &CognitiveState,
    parent_id: Option<ForkId>,
) -> Vec<Fork> {
    let params = &state.params;
    let depth = depth.max(1);
    let routing = route_mode(input);
    let order = mode_order(routing.mode, params);
    let batch = Uuid::new_v4();
    let even_share = 1.0 / ReasoningMode::ALL.len() as f64;

    if context.is_empty() {
        tracing::debug!("generating {} forks without context", depth);
    }

    (0..depth)
        .map(|i| {
            let mode = order[i % order.len()];
            let variant = (i / order.len()) as u32;
            let items = variant_context(context, params.retrieval_balance, variant);

            let mut steps = Vec::new();
            if items.is_empty() {
                steps.push("No context retrieved; reasoning from input alone".to_string());
            }
            if variant > 0 {
                steps.push(format!(
                    "Variant {}: retrieval balance shifted to {:.2}",
                    variant,
                    variant_balance(params.retrieval_balance, variant)
                ));
            }
            steps.extend(mode.strategy().reason(input, &items));
            let trace = ReasoningTrace::starting_with(routing.trace_step(), steps);

            let mut confidence = mode.base_confidence()
                + jitter(input, mode, variant, state.version)
                + (params.mode_weights.share(mode) - even_share) * 0.3
                - VARIANT_PENALTY * variant as f64;
            if items.is_empty() {
                confidence -= EMPTY_CONTEXT_PENALTY;
            }

            Fork::from_draft(ForkDraft {
                id: ForkId::new(batch, i as u32),
                parent_id,
                hypothesis: synthesize(mode, &trace, input),
                mode,
                variant,
                trace,
                confidence: confidence.clamp(0.05, 1.0),
                config_version: state.version,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::ContextSource;
    use crate::state::{CognitiveParams, StateStore};

    fn item(key: &str, content: &str, relevance: f64, source: ContextSource) -> ContextItem {
        ContextItem {
            key: key.into(),
            content: content.into(),
            relevance,
            source,
        }
    }

    fn context() -> ContextSnapshot {
        ContextSnapshot::from_items(
            "q",
            vec![
                item("a", "Safety means avoiding harm", 0.9, ContextSource::Semantic),
                item("b", "Reviews catch mistakes", 0.7, ContextSource::Graph),
                item("c", "Stable systems degrade gracefully", 0.5, ContextSource::Semantic),
            ],
        )
    }

    #[test]
    fn test_generates_exact_depth_with_traces() {
        let store = StateStore::new(CognitiveParams::default());
        for depth in [1, 3, 7] {
            let forks = generate("What is safety?", &context(), depth, &store.pin(), None);
            assert_eq!(forks.len(), depth);
            assert!(forks.iter().all(|f| !f.trace().is_empty()));
            assert!(forks.iter().all(|f| f.config_version() == 1));
        }
    }

    #[test]
    fn test_mode_order_follows_routing_then_weights() {
        let params = CognitiveParams::default();
        assert_eq!(
            mode_order(ReasoningMode::Abductive, &params),
            vec![ReasoningMode::Abductive, ReasoningMode::Deductive, ReasoningMode::Inductive]
        );
        let mut tied = params.clone();
        tied.mode_weights.deductive = 0.3;
        tied.mode_weights.abductive = 0.3;
        assert_eq!(
            mode_order(ReasoningMode::Inductive, &tied),
            vec![ReasoningMode::Inductive, ReasoningMode::Deductive, ReasoningMode::Abductive]
        );
    }

    #[test]
    fn test_first_step_records_routing() {
        let store = StateStore::new(CognitiveParams::default());
        let forks = generate("Why did it stop?", &context(), 3, &store.pin(), None);
        assert_eq!(forks[0].mode(), ReasoningMode::Abductive);
        for f in &forks {
            assert!(f.trace().steps()[0].starts_with("Mode routing: abductive"));
        }
    }

    #[test]
    fn test_repeated_modes_are_not_duplicates() {
        let store = StateStore::new(CognitiveParams::default());
        let forks = generate("What is safety?", &context(), 6, &store.pin(), None);
        assert_eq!(forks[3].mode(), forks[0].mode());
        assert_eq!(forks[3].variant(), 1);
        for i in 0..forks.len() {
            for j in (i + 1)..forks.len() {
                assert_ne!(forks[i].hypothesis(), forks[j].hypothesis());
                assert_ne!(forks[i].trace(), forks[j].trace());
            }
        }
    }

    #[test]
    fn test_empty_context_lowers_confidence_and_says_so() {
        let store = StateStore::new(CognitiveParams::default());
        let state = store.pin();
        let with = generate("What is safety?", &context(), 3, &state, None);
        let without = generate("What is safety?", &ContextSnapshot::empty("q"), 3, &state, None);
        assert_eq!(without.len(), 3);
        for (a, b) in with.iter().zip(without.iter()) {
            assert!(b.confidence() < a.confidence());
            assert!(b.trace().steps().iter().any(|s| s.starts_with("No context retrieved")));
        }
    }

    #[test]
    fn test_confidence_is_deterministic_for_same_state() {
        let store = StateStore::new(CognitiveParams::default());
        let state = store.pin();
        let a = generate("What is safety?", &context(), 3, &state, None);
        let b = generate("What is safety?", &context(), 3, &state, None);
        let ca: Vec<f64> = a.iter().map(|f| f.confidence()).collect();
        let cb: Vec<f64> = b.iter().map(|f| f.confidence()).collect();
        assert_eq!(ca, cb);
    }

    #[test]
    fn test_empty_input_and_zero_depth_are_total() {
        let store = StateStore::new(CognitiveParams::default());
        let forks = generate("", &ContextSnapshot::empty(""), 0, &store.pin(), None);
        assert_eq!(forks.len(), 1);
        assert!(forks[0].hypothesis().ends_with("(empty input)"));
    }

    #[test]
    fn test_variant_balance_wraps() {
        assert_eq!(variant_balance(0.6, 0), 0.6);
        let b = variant_balance(0.6, 2);
        assert!((0.0..1.0).contains(&b));
        assert!((b - 0.3).abs() < 1e-9);
    }
}
