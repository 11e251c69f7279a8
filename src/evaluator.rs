//! Field Evaluator: projects a fork onto the affective and predictive fields.
//!
//! Each component starts from a fixed prior and moves by
//! `weight * step * evidence`, where evidence is the number of distinct
//! raising keywords present minus the number of distinct lowering keywords
//! present (whole-word matches over the fork's hypothesis and trace). The two
//! fields are computed independently; neither reads the other.

use tokio::task::JoinHandle;

use crate::fork::{AffectiveVector, Fork, PredictiveVector};
use crate::state::CognitiveParams;
use crate::utils::math::clamp_or;
use crate::utils::text::{matched_keywords, tokenize};

pub const TRUST_KEYWORDS: &[&str] = &["confident", "certain", "verified", "proven", "reliable"];
pub const DISTRUST_KEYWORDS: &[&str] = &["uncertain", "unclear", "ambiguous", "unknown", "doubt"];
pub const FEAR_KEYWORDS: &[&str] = &["risk", "danger", "harm", "threat", "unsafe", "critical"];
pub const URGENCY_KEYWORDS: &[&str] = &["urgent", "immediate", "now", "deadline", "critical", "asap"];
pub const SATISFACTION_KEYWORDS: &[&str] =
    &["good", "great", "excellent", "solve", "achieve", "success"];
pub const FRUSTRATION_KEYWORDS: &[&str] =
    &["conflict", "blocked", "contradiction", "constraint", "stuck"];

pub const RISK_KEYWORDS: &[&str] = &["fail", "error", "wrong", "broken", "crash", "loss"];
pub const REWARD_KEYWORDS: &[&str] = &["improve", "benefit", "gain", "efficient", "effective"];
pub const VOLATILITY_KEYWORDS: &[&str] = &["change", "dynamic", "complex", "vary", "unstable"];
pub const STABILITY_KEYWORDS: &[&str] = &["stable", "consistent", "reliable", "robust", "steady"];

/// Prior value, per-hit step, and the keyword sets that move one dimension.
#[derive(Debug, Clone, Copy)]
pub struct Signal {
    pub prior: f64,
    pub step: f64,
    pub raises: &'static [&'static str],
    pub lowers: &'static [&'static str],
}

impl Signal {
    fn evidence(&self, tokens: &[String]) -> f64 {
        matched_keywords(tokens, self.raises).len() as f64
            - matched_keywords(tokens, self.lowers).len() as f64
    }

    fn project(&self, tokens: &[String], weight: f64, range: (f64, f64)) -> f64 {
        let value = self.prior + weight * self.step * self.evidence(tokens);
        clamp_or(value, range.0, range.1, self.prior)
    }
}

/// In `AffectDim` order.
pub const AFFECT_SIGNALS: [Signal; 5] = [
    Signal { prior: 0.5, step: 0.08, raises: TRUST_KEYWORDS, lowers: DISTRUST_KEYWORDS },
    Signal { prior: 0.1, step: 0.1, raises: FEAR_KEYWORDS, lowers: &[] },
    Signal { prior: 0.3, step: 0.1, raises: URGENCY_KEYWORDS, lowers: &[] },
    Signal { prior: 0.5, step: 0.07, raises: SATISFACTION_KEYWORDS, lowers: &[] },
    Signal { prior: 0.1, step: 0.08, raises: FRUSTRATION_KEYWORDS, lowers: &[] },
];

/// In `PredictDim` order.
pub const PREDICT_SIGNALS: [Signal; 4] = [
    Signal { prior: 0.2, step: 0.08, raises: RISK_KEYWORDS, lowers: &[] },
    Signal { prior: 0.5, step: 0.07, raises: REWARD_KEYWORDS, lowers: &[] },
    Signal { prior: 0.3, step: 0.06, raises: VOLATILITY_KEYWORDS, lowers: &[] },
    Signal { prior: 0.5, step: 0.07, raises: STABILITY_KEYWORDS, lowers: &[] },
];

pub fn affective_field(tokens: &[String], weights: &[f64; 5]) -> AffectiveVector {
    let mut out = [0.0; 5];
    for (i, signal) in AFFECT_SIGNALS.iter().enumerate() {
        out[i] = signal.project(tokens, weights[i], AffectiveVector::RANGE);
    }
    AffectiveVector::from_array(out)
}

pub fn predictive_field(tokens: &[String], weights: &[f64; 4]) -> PredictiveVector {
    let mut out = [0.0; 4];
    for (i, signal) in PREDICT_SIGNALS.iter().enumerate() {
        out[i] = signal.project(tokens, weights[i], PredictiveVector::RANGE);
    }
    PredictiveVector::from_array(out)
}

/// Both fields for arbitrary text under explicit weights. Learning uses this
/// to re-score a fork under perturbed weights.
pub fn score_text(
    text: &str,
    affect_weights: &[f64; 5],
    predictive_weights: &[f64; 4],
) -> (AffectiveVector, PredictiveVector) {
    let tokens = tokenize(text);
    (
        affective_field(&tokens, affect_weights),
        predictive_field(&tokens, predictive_weights),
    )
}

/// Populate both vectors of `fork` under the pinned parameters.
pub fn annotate(fork: Fork, params: &CognitiveParams) -> Fork {
    let (affective, predictive) = score_text(
        &fork.scored_text(),
        &params.affect_weights,
        &params.predictive_weights,
    );
    fork.with_fields(affective, predictive)
}

/// Annotate a batch in parallel on the blocking pool, preserving order.
///
/// A task that fails to join is re-evaluated inline, so the result always has
/// one annotated fork per input.
pub async fn annotate_batch(forks: Vec<Fork>, params: &CognitiveParams) -> Vec<Fork> {
    let tasks: Vec<(Fork, JoinHandle<Fork>)> = forks
        .into_iter()
        .map(|fork| {
            let owned = fork.clone();
            let params = params.clone();
            let handle = tokio::task::spawn_blocking(move || annotate(owned, &params));
            (fork, handle)
        })
        .collect();

    let mut out = Vec::with_capacity(tasks.len());
    for (original, handle) in tasks {
        match handle.await {
            Ok(annotated) => out.push(annotated),
            Err(e) => {
                tracing::warn!("evaluation task for fork {} failed: {}", original.id(), e);
                out.push(annotate(original, params));
            }
        }
    }
    out
}
