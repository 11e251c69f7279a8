//! Selector: picks exactly one fork from the gate's candidates.

use std::cmp::Ordering;

use crate::curvature::GateOutcome;
use crate::fork::Fork;

/// Ranking key: ascending curvature, then descending confidence, then
/// ascending fork id. Total over all floats.
pub fn rank(a: &Fork, b: &Fork) -> Ordering {
    a.curvature()
        .total_cmp(&b.curvature())
        .then_with(|| b.confidence().total_cmp(&a.confidence()))
        .then_with(|| a.id().cmp(&b.id()))
}

/// Best fork among `forks`, or `None` for an empty slice.
pub fn select(forks: &[Fork]) -> Option<&Fork> {
    forks.iter().min_by(|a, b| rank(a, b))
}

/// Best fork among the gate's candidates.
pub fn select_from(outcome: &GateOutcome) -> Option<&Fork> {
    outcome
        .candidates
        .iter()
        .filter_map(|i| outcome.forks.get(*i))
        .min_by(|a, b| rank(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognitive::ReasoningMode;
    use crate::fork::{ForkDraft, ForkId, ReasoningTrace};
    use uuid::Uuid;

    fn fork(i: u32, kappa: f64, confidence: f64) -> Fork {
        Fork::from_draft(ForkDraft {
            id: ForkId::new(Uuid::nil(), i),
            parent_id: None,
            hypothesis: String::new(),
            mode: ReasoningMode::Deductive,
            variant: 0,
            trace: ReasoningTrace::new(vec!["s".into()]).unwrap(),
            confidence,
            config_version: 1,
        })
        .with_curvature(kappa)
    }

    #[test]
    fn test_lowest_curvature_wins() {
        let forks = vec![fork(0, 0.4, 0.9), fork(1, 0.1, 0.2), fork(2, 0.3, 0.9)];
        assert_eq!(select(&forks).unwrap().id().index(), 1);
    }

    #[test]
    fn test_confidence_breaks_curvature_tie() {
        let forks = vec![fork(0, 0.2, 0.5), fork(1, 0.2, 0.7)];
        assert_eq!(select(&forks).unwrap().id().index(), 1);
    }

    #[test]
    fn test_id_breaks_full_tie_regardless_of_order() {
        let a = vec![fork(2, 0.0, 0.5), fork(1, 0.0, 0.5)];
        let b = vec![fork(1, 0.0, 0.5), fork(2, 0.0, 0.5)];
        assert_eq!(select(&a).unwrap().id(), select(&b).unwrap().id());
        assert_eq!(select(&a).unwrap().id().index(), 1);
    }

    #[test]
    fn test_select_from_respects_candidates() {
        let outcome = GateOutcome {
            forks: vec![fork(0, 0.0, 0.9), fork(1, 0.5, 0.1)],
            candidates: vec![1],
            degraded: false,
        };
        assert_eq!(select_from(&outcome).unwrap().id().index(), 1);
        assert!(select(&[]).is_none());
    }
}
