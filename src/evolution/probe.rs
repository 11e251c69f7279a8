//! Safety testing of a candidate configuration away from the live path.
//!
//! All synthetic probe inputs are generated under the candidate, pooled into
//! one batch, evaluated and scored for curvature together. Recently validated
//! forks (the held-out set) are re-scored under the candidate against their
//! recorded outcomes.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::belief::ContextSnapshot;
use crate::curvature;
use crate::evaluator::annotate_batch;
use crate::fork::{Fork, ValidationRecord};
use crate::generator::generate;
use crate::learning::{join_weights, objective};
use crate::state::{CognitiveParams, CognitiveState, StateOrigin};
use crate::utils::math::mean;

/// A validated fork kept for regression testing.
#[derive(Debug, Clone)]
pub struct HeldOutSample {
    pub fork: Fork,
    pub record: ValidationRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub probe_forks: usize,
    pub held_out: usize,
    pub max_kappa: f64,
    /// min(active κ_max, candidate κ_max)
    pub kappa_limit: f64,
    pub active_value: f64,
    pub candidate_value: f64,
}

impl TestReport {
    pub fn kappa_ok(&self) -> bool {
        curvature::admit(self.max_kappa, self.kappa_limit)
    }

    pub fn value_ok(&self, tolerance: f64) -> bool {
        self.candidate_value.is_finite() && self.candidate_value >= self.active_value - tolerance
    }
}

/// Pooled probe batch under `params`, with curvature set on every fork.
///
/// `version` is stamped on the provisional state so the active and candidate
/// runs share confidence jitter and differ only by parameters.
pub async fn probe_batch(inputs: &[String], params: &CognitiveParams, version: u64) -> Vec<Fork> {
    let provisional = CognitiveState {
        version,
        parent_version: None,
        params: params.clone(),
        origin: StateOrigin::Evolution,
        created_at: Utc::now(),
    };
    let drafts: Vec<Fork> = inputs
        .iter()
        .flat_map(|input| {
            generate(
                input,
                &ContextSnapshot::empty(input.as_str()),
                params.fork_depth,
                &provisional,
                None,
            )
        })
        .collect();
    let evaluated = annotate_batch(drafts, params).await;
    curvature::gate(evaluated, params).forks
}

/// Mean learning objective of the held-out samples under `params`.
pub fn held_out_objective<'a>(
    samples: impl IntoIterator<Item = &'a HeldOutSample>,
    params: &CognitiveParams,
) -> Option<f64> {
    let weights = join_weights(&params.affect_weights, &params.predictive_weights);
    let scores: Vec<f64> = samples
        .into_iter()
        .map(|s| objective(&s.fork.scored_text(), &s.record.actual, &weights))
        .collect();
    if scores.is_empty() { None } else { Some(mean(&scores)) }
}

/// Mean fork value over the probe batch plus the held-out objective.
pub fn aggregate_value(probe: &[Fork], held_out: Option<f64>) -> f64 {
    let values: Vec<f64> = probe.iter().map(|f| f.value()).collect();
    mean(&values) + held_out.unwrap_or(0.0)
}

pub async fn run(
    inputs: &[String],
    held_out: &VecDeque<HeldOutSample>,
    active: &CognitiveState,
    candidate: &CognitiveParams,
) -> TestReport {
    let active_batch = probe_batch(inputs, &active.params, active.version).await;
    let candidate_batch = probe_batch(inputs, candidate, active.version).await;

    let max_kappa = candidate_batch
        .iter()
        .map(|f| f.curvature())
        .fold(0.0, f64::max);

    TestReport {
        probe_forks: candidate_batch.len(),
        held_out: held_out.len(),
        max_kappa,
        kappa_limit: active.params.kappa_max.min(candidate.kappa_max),
        active_value: aggregate_value(&active_batch, held_out_objective(held_out, &active.params)),
        candidate_value: aggregate_value(&candidate_batch, held_out_objective(held_out, candidate)),
    }
}
