//! Learning Update: a bounded gradient step on the field weights from one
//! validation record.
//!
//! The objective is V(w) = −mean over supplied dimensions of
//! (actual − predicted(w))², where predicted(w) re-scores the fork's own text
//! under weights w. The gradient is estimated by central finite differences
//! over the nine field weights. The result is a proposal; committing it is
//! the evolution engine's job.

use serde::{Deserialize, Serialize};

use crate::config::LearningConfig;
use crate::evaluator::score_text;
use crate::evolution::{Mutation, MutationOrigin, ParamChange};
use crate::fork::{AffectDim, Fork, OutcomeVector, PredictDim, ValidationRecord};
use crate::state::params::{WEIGHT_MAX, WEIGHT_MIN};
use crate::state::{CognitiveState, ParamField};

/// All nine weights as one vector: affective first, then predictive.
pub type WeightVector = [f64; 9];

pub fn weight_fields() -> [ParamField; 9] {
    let mut out = [ParamField::Alpha; 9];
    for (i, d) in AffectDim::ALL.into_iter().enumerate() {
        out[i] = ParamField::AffectWeight(d);
    }
    for (i, d) in PredictDim::ALL.into_iter().enumerate() {
        out[5 + i] = ParamField::PredictiveWeight(d);
    }
    out
}

pub fn split_weights(w: &WeightVector) -> ([f64; 5], [f64; 4]) {
    let mut a = [0.0; 5];
    let mut p = [0.0; 4];
    a.copy_from_slice(&w[..5]);
    p.copy_from_slice(&w[5..]);
    (a, p)
}

pub fn join_weights(a: &[f64; 5], p: &[f64; 4]) -> WeightVector {
    let mut w = [0.0; 9];
    w[..5].copy_from_slice(a);
    w[5..].copy_from_slice(p);
    w
}

/// V(w) for `text` against `actual`. Zero when no dimension was supplied.
pub fn objective(text: &str, actual: &OutcomeVector, weights: &WeightVector) -> f64 {
    let actual = actual.sanitized();
    if actual.values.is_empty() {
        return 0.0;
    }
    let (a, p) = split_weights(weights);
    let (affective, predictive) = score_text(text, &a, &p);
    let sq: f64 = actual
        .values
        .iter()
        .map(|(dim, v)| (v - dim.read(&affective, &predictive)).powi(2))
        .sum();
    -(sq / actual.values.len() as f64)
}

/// Central finite-difference gradient of V. Non-finite components become 0.
pub fn gradient(text: &str, actual: &OutcomeVector, weights: &WeightVector, eps: f64) -> WeightVector {
    let mut g = [0.0; 9];
    for k in 0..9 {
        let mut plus = *weights;
        let mut minus = *weights;
        plus[k] += eps;
        minus[k] -= eps;
        let d = (objective(text, actual, &plus) - objective(text, actual, &minus)) / (2.0 * eps);
        g[k] = if d.is_finite() { d } else { 0.0 };
    }
    g
}

/// Proposed weight change for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightStep {
    pub field: ParamField,
    pub gradient: f64,
    pub from: f64,
    pub to: f64,
}

impl WeightStep {
    pub fn delta(&self) -> f64 {
        self.to - self.from
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningProposal {
    pub fork_id: crate::fork::ForkId,
    pub base_version: u64,
    pub objective: f64,
    pub steps: Vec<WeightStep>,
}

impl LearningProposal {
    /// Largest absolute weight change in the proposal.
    pub fn max_abs_delta(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| s.delta().abs())
            .fold(0.0, f64::max)
    }

    pub fn is_noop(&self) -> bool {
        self.steps.iter().all(|s| s.delta() == 0.0)
    }

    /// The non-zero steps as a mutation for the evolution engine.
    pub fn to_mutation(&self) -> Mutation {
        Mutation {
            changes: self
                .steps
                .iter()
                .filter(|s| s.delta() != 0.0)
                .map(|s| ParamChange {
                    field: s.field,
                    value: s.to,
                })
                .collect(),
            origin: MutationOrigin::Learning,
            rationale: format!("learning step from validation of fork {}", self.fork_id),
        }
    }
}

/// Bounded step Δ = α∇V, each component clamped to ±`max_weight_delta` and
/// the resulting weights clamped to the weight range.
pub fn update(
    state: &CognitiveState,
    fork: &Fork,
    record: &ValidationRecord,
    cfg: &LearningConfig,
) -> LearningProposal {
    let params = &state.params;
    let weights = join_weights(&params.affect_weights, &params.predictive_weights);
    let text = fork.scored_text();
    let eps = if cfg.fd_epsilon.is_finite() && cfg.fd_epsilon > 0.0 {
        cfg.fd_epsilon
    } else {
        1e-4
    };
    let bound = if cfg.max_weight_delta.is_finite() {
        cfg.max_weight_delta.abs()
    } else {
        0.0
    };
    let alpha = if params.alpha.is_finite() { params.alpha } else { 0.0 };

    let grad = gradient(&text, &record.actual, &weights, eps);
    let steps = weight_fields()
        .into_iter()
        .zip(grad)
        .zip(weights)
        .map(|((field, g), from)| {
            let raw = alpha * g;
            let delta = if raw.is_finite() { raw.clamp(-bound, bound) } else { 0.0 };
            let to = (from + delta).clamp(WEIGHT_MIN, WEIGHT_MAX);
            WeightStep {
                field,
                gradient: g,
                from,
                to,
            }
        })
        .collect();

    LearningProposal {
        fork_id: fork.id(),
        base_version: state.version,
        objective: objective(&text, &record.actual, &weights),
        steps,
    }
}
