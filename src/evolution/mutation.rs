//! Mutations: bounded change sets over whitelisted parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{ForkMindError, Result};
use crate::state::{CognitiveParams, Limits, ParamField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOrigin {
    /// Seeded automatic perturbation.
    Random,
    /// Converted from a learning proposal.
    Learning,
    /// Requested explicitly by a caller.
    Manual,
    /// Re-commit of a retained version. Exempt from the step bound.
    Revert,
}

impl MutationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOrigin::Random => "random",
            MutationOrigin::Learning => "learning",
            MutationOrigin::Manual => "manual",
            MutationOrigin::Revert => "revert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamChange {
    pub field: ParamField,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub changes: Vec<ParamChange>,
    pub origin: MutationOrigin,
    #[serde(default)]
    pub rationale: String,
}

impl Mutation {
    pub fn manual() -> Self {
        Self {
            changes: Vec::new(),
            origin: MutationOrigin::Manual,
            rationale: String::new(),
        }
    }

    pub fn set(mut self, field: ParamField, value: f64) -> Self {
        self.changes.push(ParamChange { field, value });
        self
    }

    /// Build a manual mutation from field names. Any name outside the
    /// whitelist is rejected as a bounds violation.
    pub fn from_named<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Result<Self> {
        let mut mutation = Self::manual();
        for (name, value) in pairs {
            let field: ParamField = name.parse()?;
            mutation.changes.push(ParamChange { field, value });
        }
        Ok(mutation)
    }

    /// Names of the fields this mutation touches.
    pub fn fields(&self) -> Vec<String> {
        self.changes.iter().map(|c| c.field.name()).collect()
    }

    /// Apply to `base`, checking every change against its range and, unless
    /// this is a revert, its per-proposal step bound.
    pub fn apply(&self, base: &CognitiveParams, limits: &Limits) -> Result<CognitiveParams> {
        if self.changes.is_empty() {
            return Err(ForkMindError::bounds("mutation", "no changes proposed"));
        }
        let mut seen = BTreeSet::new();
        let mut candidate = base.clone();
        for change in &self.changes {
            let field = change.field;
            if !seen.insert(field) {
                return Err(ForkMindError::bounds(field.name(), "field changed twice"));
            }
            let bounds = limits.bounds(field);
            if !bounds.contains(change.value) {
                return Err(ForkMindError::bounds(
                    field.name(),
                    format!(
                        "{} outside [{}, {}]",
                        change.value, bounds.min, bounds.max
                    ),
                ));
            }
            if field.is_integral() && change.value.fract() != 0.0 {
                return Err(ForkMindError::bounds(
                    field.name(),
                    format!("{} is not a whole number", change.value),
                ));
            }
            let step = (change.value - base.get(field)).abs();
            if self.origin != MutationOrigin::Revert && step > bounds.max_step + 1e-12 {
                return Err(ForkMindError::bounds(
                    field.name(),
                    format!("step {:.4} exceeds bound {}", step, bounds.max_step),
                ));
            }
            candidate.set(field, change.value);
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fork::AffectDim;

    const FEAR: ParamField = ParamField::AffectWeight(AffectDim::Fear);

    #[test]
    fn test_apply_within_bounds() {
        let base = CognitiveParams::default();
        let m = Mutation::manual().set(FEAR, 3.0).set(ParamField::KappaMax, 0.9);
        let out = m.apply(&base, &Limits::default()).unwrap();
        assert_eq!(out.affect_weights[1], 3.0);
        assert_eq!(out.kappa_max, 0.9);
        assert_eq!(out.mode_weights, base.mode_weights);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let base = CognitiveParams::default();
        let err = Mutation::manual()
            .set(ParamField::Alpha, 0.2)
            .apply(&base, &Limits::default())
            .unwrap_err();
        assert!(matches!(err, ForkMindError::BoundsViolation { ref field, .. } if field == "alpha"));
        assert!(Mutation::manual()
            .set(FEAR, f64::NAN)
            .apply(&base, &Limits::default())
            .is_err());
    }

    #[test]
    fn test_step_bound_rejected_unless_revert() {
        let base = CognitiveParams::default();
        let mut m = Mutation::manual().set(ParamField::ForkDepth, 8.0);
        assert!(m.apply(&base, &Limits::default()).is_err());
        m.origin = MutationOrigin::Revert;
        assert_eq!(m.apply(&base, &Limits::default()).unwrap().fork_depth, 8);
    }

    #[test]
    fn test_fractional_depth_and_duplicates_rejected() {
        let base = CognitiveParams::default();
        assert!(Mutation::manual()
            .set(ParamField::ForkDepth, 3.5)
            .apply(&base, &Limits::default())
            .is_err());
        assert!(Mutation::manual()
            .set(ParamField::Alpha, 0.02)
            .set(ParamField::Alpha, 0.03)
            .apply(&base, &Limits::default())
            .is_err());
        assert!(Mutation::manual().apply(&base, &Limits::default()).is_err());
    }

    #[test]
    fn test_named_non_whitelisted_rejected() {
        let err = Mutation::from_named([("mode_weights.abductive", 0.9)]).unwrap_err();
        assert!(matches!(err, ForkMindError::BoundsViolation { .. }));
        let ok = Mutation::from_named([("affect_weights.fear", 1.5), ("alpha", 0.02)]).unwrap();
        assert_eq!(ok.fields(), vec!["affect_weights.fear", "alpha"]);
    }
}
