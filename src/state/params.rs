//! Cognitive parameters, the mutation whitelist, and per-field bounds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cognitive::ReasoningMode;
use crate::error::{ForkMindError, Result};
use crate::fork::{AffectDim, PredictDim};

/// Relative priority of each reasoning mode when ordering forks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeWeights {
    pub deductive: f64,
    pub inductive: f64,
    pub abductive: f64,
}

impl ModeWeights {
    pub fn get(&self, mode: ReasoningMode) -> f64 {
        match mode {
            ReasoningMode::Deductive => self.deductive,
            ReasoningMode::Inductive => self.inductive,
            ReasoningMode::Abductive => self.abductive,
        }
    }

    /// Weight of `mode` as a share of the total, or an even share when the
    /// total is not positive.
    pub fn share(&self, mode: ReasoningMode) -> f64 {
        let total = self.deductive + self.inductive + self.abductive;
        if total > 0.0 && total.is_finite() {
            self.get(mode) / total
        } else {
            1.0 / ReasoningMode::ALL.len() as f64
        }
    }
}

impl Default for ModeWeights {
    fn default() -> Self {
        Self {
            deductive: 0.4,
            inductive: 0.35,
            abductive: 0.25,
        }
    }
}

/// The full set of values that govern one cognitive cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitiveParams {
    /// Sensitivity per affective dimension (trust, fear, urgency, satisfaction, frustration).
    pub affect_weights: [f64; 5],
    /// Sensitivity per predictive dimension (risk, reward, volatility, stability).
    pub predictive_weights: [f64; 4],
    pub alpha: f64,
    pub kappa_max: f64,
    pub fork_depth: usize,
    pub mode_weights: ModeWeights,
    /// Share of context relevance given to semantic matches; graph matches get the rest.
    pub retrieval_balance: f64,
}

impl Default for CognitiveParams {
    fn default() -> Self {
        Self {
            affect_weights: [1.0; 5],
            predictive_weights: [1.0; 4],
            alpha: 0.01,
            kappa_max: 0.8,
            fork_depth: 3,
            mode_weights: ModeWeights::default(),
            retrieval_balance: 0.6,
        }
    }
}

/// A parameter the evolution engine is allowed to touch.
///
/// Fields absent from this enum (the mode priority weights) cannot be named
/// by a mutation at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParamField {
    AffectWeight(AffectDim),
    PredictiveWeight(PredictDim),
    Alpha,
    KappaMax,
    ForkDepth,
    RetrievalBalance,
}

impl ParamField {
    pub fn all() -> Vec<ParamField> {
        let mut out: Vec<ParamField> = AffectDim::ALL.into_iter().map(ParamField::AffectWeight).collect();
        out.extend(PredictDim::ALL.into_iter().map(ParamField::PredictiveWeight));
        out.extend([
            ParamField::Alpha,
            ParamField::KappaMax,
            ParamField::ForkDepth,
            ParamField::RetrievalBalance,
        ]);
        out
    }

    pub fn name(&self) -> String {
        match self {
            ParamField::AffectWeight(d) => format!("affect_weights.{}", d.as_str()),
            ParamField::PredictiveWeight(d) => format!("predictive_weights.{}", d.as_str()),
            ParamField::Alpha => "alpha".to_string(),
            ParamField::KappaMax => "kappa_max".to_string(),
            ParamField::ForkDepth => "fork_depth".to_string(),
            ParamField::RetrievalBalance => "retrieval_balance".to_string(),
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, ParamField::ForkDepth)
    }
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for ParamField {
    type Err = ForkMindError;

    /// Resolves a field by name. Anything outside the whitelist, including
    /// existing but protected fields like `mode_weights.*`, is a bounds violation.
    fn from_str(s: &str) -> Result<Self> {
        ParamField::all()
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| ForkMindError::bounds(s, "field is not in the mutation whitelist"))
    }
}

impl TryFrom<String> for ParamField {
    type Error = ForkMindError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ParamField> for String {
    fn from(field: ParamField) -> Self {
        field.name()
    }
}

/// Declared range and maximum single-proposal step for one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBounds {
    pub min: f64,
    pub max: f64,
    pub max_step: f64,
}

impl ParamBounds {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

pub const WEIGHT_MIN: f64 = 0.0;
pub const WEIGHT_MAX: f64 = 4.0;
pub const WEIGHT_MAX_STEP: f64 = 3.0;

/// Range limits for every whitelisted field, built from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub kappa_min: f64,
    pub kappa_ceiling: f64,
    pub max_fork_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            alpha_min: 0.0,
            alpha_max: 0.05,
            kappa_min: 0.1,
            kappa_ceiling: 2.0,
            max_fork_depth: 12,
        }
    }
}

impl Limits {
    pub fn bounds(&self, field: ParamField) -> ParamBounds {
        match field {
            ParamField::AffectWeight(_) | ParamField::PredictiveWeight(_) => ParamBounds {
                min: WEIGHT_MIN,
                max: WEIGHT_MAX,
                max_step: WEIGHT_MAX_STEP,
            },
            ParamField::Alpha => ParamBounds {
                min: self.alpha_min,
                max: self.alpha_max,
                max_step: 0.02,
            },
            ParamField::KappaMax => ParamBounds {
                min: self.kappa_min,
                max: self.kappa_ceiling,
                max_step: 0.5,
            },
            ParamField::ForkDepth => ParamBounds {
                min: 1.0,
                max: self.max_fork_depth as f64,
                max_step: 2.0,
            },
            ParamField::RetrievalBalance => ParamBounds {
                min: 0.0,
                max: 1.0,
                max_step: 0.5,
            },
        }
    }
}

impl CognitiveParams {
    pub fn get(&self, field: ParamField) -> f64 {
        match field {
            ParamField::AffectWeight(d) => self.affect_weights[d.index()],
            ParamField::PredictiveWeight(d) => self.predictive_weights[d.index()],
            ParamField::Alpha => self.alpha,
            ParamField::KappaMax => self.kappa_max,
            ParamField::ForkDepth => self.fork_depth as f64,
            ParamField::RetrievalBalance => self.retrieval_balance,
        }
    }

    /// Writes one whitelisted field. Callers validate bounds first.
    pub(crate) fn set(&mut self, field: ParamField, value: f64) {
        match field {
            ParamField::AffectWeight(d) => self.affect_weights[d.index()] = value,
            ParamField::PredictiveWeight(d) => self.predictive_weights[d.index()] = value,
            ParamField::Alpha => self.alpha = value,
            ParamField::KappaMax => self.kappa_max = value,
            ParamField::ForkDepth => self.fork_depth = value.round().max(1.0) as usize,
            ParamField::RetrievalBalance => self.retrieval_balance = value,
        }
    }

    /// Names of every field whose value differs between `self` and `other`,
    /// including fields outside the whitelist.
    pub fn diff(&self, other: &CognitiveParams) -> Vec<String> {
        let mut out: Vec<String> = ParamField::all()
            .into_iter()
            .filter(|f| self.get(*f).to_bits() != other.get(*f).to_bits())
            .map(|f| f.name())
            .collect();
        for mode in ReasoningMode::ALL {
            if self.mode_weights.get(mode).to_bits() != other.mode_weights.get(mode).to_bits() {
                out.push(format!("mode_weights.{}", mode.as_str()));
            }
        }
        out
    }

    /// Checks every whitelisted field against its declared range.
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        for field in ParamField::all() {
            let bounds = limits.bounds(field);
            let value = self.get(field);
            if !bounds.contains(value) {
                return Err(ForkMindError::bounds(
                    field.name(),
                    format!("{} outside [{}, {}]", value, bounds.min, bounds.max),
                ));
            }
        }
        for mode in ReasoningMode::ALL {
            let w = self.mode_weights.get(mode);
            if !w.is_finite() || w < 0.0 {
                return Err(ForkMindError::bounds(
                    format!("mode_weights.{}", mode.as_str()),
                    format!("{} must be a finite non-negative weight", w),
                ));
            }
        }
        Ok(())
    }
}
