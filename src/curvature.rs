//! Curvature Gate: relational tension of each fork against its siblings.
//!
//! κ_i = ‖w_S ⊙ (S_i − S̄)‖₂ + ‖w_P ⊙ (P_i − P̄)‖₂
//!
//! where S̄ and P̄ are the batch means and the weights come from the pinned
//! configuration. A batch of one has no siblings and scores κ = 0.

use crate::fork::Fork;
use crate::state::CognitiveParams;
use crate::utils::math::{column_means, weighted_deviation};

/// Curvature for every fork in `batch`, in batch order.
pub fn score(batch: &[Fork], params: &CognitiveParams) -> Vec<f64> {
    if batch.len() <= 1 {
        return vec![0.0; batch.len()];
    }
    let affect: Vec<[f64; 5]> = batch.iter().map(|f| f.affective().to_array()).collect();
    let predict: Vec<[f64; 4]> = batch.iter().map(|f| f.predictive().to_array()).collect();
    let affect_mean = column_means(&affect);
    let predict_mean = column_means(&predict);

    affect
        .iter()
        .zip(predict.iter())
        .map(|(s, p)| {
            let k = weighted_deviation(s, &affect_mean, &params.affect_weights)
                + weighted_deviation(p, &predict_mean, &params.predictive_weights);
            if k.is_finite() { k.max(0.0) } else { f64::INFINITY }
        })
        .collect()
}

/// Gate predicate. Non-finite curvature is never admitted.
pub fn admit(kappa: f64, kappa_max: f64) -> bool {
    kappa.is_finite() && kappa < kappa_max
}

/// Result of gating one evaluated batch.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Every fork in the batch with its curvature set, in batch order.
    pub forks: Vec<Fork>,
    /// Indices into `forks` that passed the gate, or all of them when degraded.
    pub candidates: Vec<usize>,
    /// True when no fork passed and the full set was handed on.
    pub degraded: bool,
}

impl GateOutcome {
    pub fn admitted(&self) -> usize {
        if self.degraded { 0 } else { self.candidates.len() }
    }
}

/// Score the batch, set each fork's curvature, and filter by `κ_max`.
pub fn gate(batch: Vec<Fork>, params: &CognitiveParams) -> GateOutcome {
    let kappas = score(&batch, params);
    let forks: Vec<Fork> = batch
        .into_iter()
        .zip(kappas)
        .map(|(f, k)| f.with_curvature(k))
        .collect();
    let admitted: Vec<usize> = forks
        .iter()
        .enumerate()
        .filter(|(_, f)| admit(f.curvature(), params.kappa_max))
        .map(|(i, _)| i)
        .collect();

    if admitted.is_empty() && !forks.is_empty() {
        tracing::warn!(
            "curvature gate starved: 0/{} forks below kappa_max {:.3}, passing unfiltered set",
            forks.len(),
            params.kappa_max
        );
        let all = (0..forks.len()).collect();
        GateOutcome {
            forks,
            candidates: all,
            degraded: true,
        }
    } else {
        GateOutcome {
            forks,
            candidates: admitted,
            degraded: false,
        }
    }
}
