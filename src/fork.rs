//! Fork data model: hypotheses, their two scoring fields, and validation records.
//!
//! A fork is built by the generator, annotated once by the evaluator, given a
//! curvature once by the gate, and is read-only from then on. There is no API
//! that edits a trace or a vector in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::cognitive::ReasoningMode;

/// Identifier of a fork: the generation batch it belongs to plus its position.
///
/// Ordering is by batch then index, which makes it usable as the final
/// deterministic tie-break in selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ForkId {
    batch: Uuid,
    index: u32,
}

impl ForkId {
    pub fn new(batch: Uuid, index: u32) -> Self {
        Self { batch, index }
    }

    pub fn batch(&self) -> Uuid {
        self.batch
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for ForkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.batch, self.index)
    }
}

impl FromStr for ForkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (batch, index) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("fork id '{}' is missing the ':index' suffix", s))?;
        let batch = Uuid::parse_str(batch).map_err(|e| format!("bad batch uuid: {}", e))?;
        let index = index
            .parse::<u32>()
            .map_err(|e| format!("bad fork index: {}", e))?;
        Ok(Self { batch, index })
    }
}

impl TryFrom<String> for ForkId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ForkId> for String {
    fn from(id: ForkId) -> Self {
        id.to_string()
    }
}

/// Named affective dimensions, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectDim {
    Trust,
    Fear,
    Urgency,
    Satisfaction,
    Frustration,
}

impl AffectDim {
    pub const ALL: [AffectDim; 5] = [
        AffectDim::Trust,
        AffectDim::Fear,
        AffectDim::Urgency,
        AffectDim::Satisfaction,
        AffectDim::Frustration,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AffectDim::Trust => "trust",
            AffectDim::Fear => "fear",
            AffectDim::Urgency => "urgency",
            AffectDim::Satisfaction => "satisfaction",
            AffectDim::Frustration => "frustration",
        }
    }
}

/// Named predictive dimensions, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictDim {
    Risk,
    Reward,
    Volatility,
    Stability,
}

impl PredictDim {
    pub const ALL: [PredictDim; 4] = [
        PredictDim::Risk,
        PredictDim::Reward,
        PredictDim::Volatility,
        PredictDim::Stability,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PredictDim::Risk => "risk",
            PredictDim::Reward => "reward",
            PredictDim::Volatility => "volatility",
            PredictDim::Stability => "stability",
        }
    }
}

/// Affective field projection. Every component lies in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffectiveVector {
    pub trust: f64,
    pub fear: f64,
    pub urgency: f64,
    pub satisfaction: f64,
    pub frustration: f64,
}

impl AffectiveVector {
    pub const RANGE: (f64, f64) = (-1.0, 1.0);

    pub fn from_array(v: [f64; 5]) -> Self {
        Self {
            trust: v[0],
            fear: v[1],
            urgency: v[2],
            satisfaction: v[3],
            frustration: v[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [
            self.trust,
            self.fear,
            self.urgency,
            self.satisfaction,
            self.frustration,
        ]
    }

    pub fn get(&self, dim: AffectDim) -> f64 {
        self.to_array()[dim.index()]
    }
}

impl Default for AffectiveVector {
    fn default() -> Self {
        Self::from_array([0.0; 5])
    }
}

/// Predictive field projection. Unconstrained in principle; the evaluator
/// clamps each component to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictiveVector {
    pub risk: f64,
    pub reward: f64,
    pub volatility: f64,
    pub stability: f64,
}

impl PredictiveVector {
    pub const RANGE: (f64, f64) = (0.0, 1.0);

    pub fn from_array(v: [f64; 4]) -> Self {
        Self {
            risk: v[0],
            reward: v[1],
            volatility: v[2],
            stability: v[3],
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.risk, self.reward, self.volatility, self.stability]
    }

    pub fn get(&self, dim: PredictDim) -> f64 {
        self.to_array()[dim.index()]
    }
}

impl Default for PredictiveVector {
    fn default() -> Self {
        Self::from_array([0.0; 4])
    }
}

/// Any of the nine scored dimensions; used to key outcome vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dimension {
    Affect(AffectDim),
    Predict(PredictDim),
}

impl Dimension {
    pub fn all() -> impl Iterator<Item = Dimension> {
        AffectDim::ALL
            .into_iter()
            .map(Dimension::Affect)
            .chain(PredictDim::ALL.into_iter().map(Dimension::Predict))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Affect(d) => d.as_str(),
            Dimension::Predict(d) => d.as_str(),
        }
    }

    /// Declared value range of the dimension.
    pub fn range(self) -> (f64, f64) {
        match self {
            Dimension::Affect(_) => AffectiveVector::RANGE,
            Dimension::Predict(_) => PredictiveVector::RANGE,
        }
    }

    /// Read this dimension off a pair of field vectors.
    pub fn read(self, affective: &AffectiveVector, predictive: &PredictiveVector) -> f64 {
        match self {
            Dimension::Affect(d) => affective.get(d),
            Dimension::Predict(d) => predictive.get(d),
        }
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::all()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown dimension '{}'", s))
    }
}

impl TryFrom<String> for Dimension {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dimension> for String {
    fn from(dim: Dimension) -> Self {
        dim.as_str().to_string()
    }
}

/// Ordered, non-empty list of human-readable reasoning steps.
///
/// Frozen at creation: it can be read and cloned, never appended to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ReasoningTrace(Vec<String>);

impl ReasoningTrace {
    /// Returns `None` when `steps` is empty.
    pub fn new(steps: Vec<String>) -> Option<Self> {
        if steps.is_empty() {
            None
        } else {
            Some(Self(steps))
        }
    }

    /// Always non-empty: `first` leads, `rest` follows in order.
    pub fn starting_with(first: String, rest: impl IntoIterator<Item = String>) -> Self {
        let mut steps = vec![first];
        steps.extend(rest);
        Self(steps)
    }

    pub fn steps(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last `n` steps joined with "; ", used for template synthesis.
    pub fn summary(&self, n: usize) -> String {
        let start = self.0.len().saturating_sub(n);
        self.0[start..].join("; ")
    }
}

impl TryFrom<Vec<String>> for ReasoningTrace {
    type Error = String;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        ReasoningTrace::new(value).ok_or_else(|| "reasoning trace must not be empty".to_string())
    }
}

impl From<ReasoningTrace> for Vec<String> {
    fn from(trace: ReasoningTrace) -> Self {
        trace.0
    }
}

/// One hypothesis produced for a single input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fork {
    id: ForkId,
    parent_id: Option<ForkId>,
    hypothesis: String,
    mode: ReasoningMode,
    variant: u32,
    trace: ReasoningTrace,
    affective: AffectiveVector,
    predictive: PredictiveVector,
    curvature: f64,
    confidence: f64,
    config_version: u64,
    created_at: DateTime<Utc>,
}

/// Everything the generator decides about a fork before evaluation.
#[derive(Debug, Clone)]
pub struct ForkDraft {
    pub id: ForkId,
    pub parent_id: Option<ForkId>,
    pub hypothesis: String,
    pub mode: ReasoningMode,
    pub variant: u32,
    pub trace: ReasoningTrace,
    pub confidence: f64,
    pub config_version: u64,
}

impl Fork {
    pub fn from_draft(draft: ForkDraft) -> Self {
        Self {
            id: draft.id,
            parent_id: draft.parent_id,
            hypothesis: draft.hypothesis,
            mode: draft.mode,
            variant: draft.variant,
            trace: draft.trace,
            affective: AffectiveVector::default(),
            predictive: PredictiveVector::default(),
            curvature: 0.0,
            confidence: draft.confidence.clamp(0.0, 1.0),
            config_version: draft.config_version,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ForkId {
        self.id
    }

    pub fn parent_id(&self) -> Option<ForkId> {
        self.parent_id
    }

    pub fn hypothesis(&self) -> &str {
        &self.hypothesis
    }

    pub fn mode(&self) -> ReasoningMode {
        self.mode
    }

    pub fn variant(&self) -> u32 {
        self.variant
    }

    pub fn trace(&self) -> &ReasoningTrace {
        &self.trace
    }

    pub fn affective(&self) -> &AffectiveVector {
        &self.affective
    }

    pub fn predictive(&self) -> &PredictiveVector {
        &self.predictive
    }

    pub fn curvature(&self) -> f64 {
        self.curvature
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn config_version(&self) -> u64 {
        self.config_version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Text the evaluator scores: hypothesis followed by every trace step.
    pub fn scored_text(&self) -> String {
        let mut text = self.hypothesis.clone();
        for step in self.trace.steps() {
            text.push(' ');
            text.push_str(step);
        }
        text
    }

    /// Composite value of a fork outcome, used as the evolution objective.
    pub fn value(&self) -> f64 {
        self.predictive.reward * 0.4
            + self.affective.satisfaction * 0.3
            + self.affective.trust * 0.2
            + self.confidence * 0.1
            - self.curvature * 0.2
    }

    pub(crate) fn with_fields(mut self, affective: AffectiveVector, predictive: PredictiveVector) -> Self {
        self.affective = affective;
        self.predictive = predictive;
        self
    }

    pub(crate) fn with_curvature(mut self, curvature: f64) -> Self {
        self.curvature = curvature;
        self
    }
}

/// Externally supplied ground truth, keyed by dimension. Any subset of the
/// nine dimensions may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeVector {
    #[serde(default)]
    pub values: BTreeMap<Dimension, f64>,
    /// Observed harm in [0, 1], used only for curvature effectiveness audits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harm: Option<f64>,
}

impl OutcomeVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dim: Dimension, value: f64) -> Self {
        self.values.insert(dim, value);
        self
    }

    pub fn with_harm(mut self, harm: f64) -> Self {
        self.harm = Some(harm);
        self
    }

    /// Drops non-finite entries and clamps the rest to their declared range.
    pub fn sanitized(&self) -> Self {
        let values = self
            .values
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(d, v)| {
                let (lo, hi) = d.range();
                (*d, v.clamp(lo, hi))
            })
            .collect();
        let harm = self.harm.filter(|h| h.is_finite()).map(|h| h.clamp(0.0, 1.0));
        Self { values, harm }
    }
}

/// Ground truth attached to a previously produced fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub fork_id: ForkId,
    pub actual: OutcomeVector,
    /// actual − predicted, for each supplied dimension.
    pub delta: BTreeMap<Dimension, f64>,
    pub recorded_at: DateTime<Utc>,
}

impl ValidationRecord {
    pub fn new(fork: &Fork, actual: &OutcomeVector) -> Self {
        let actual = actual.sanitized();
        let delta = actual
            .values
            .iter()
            .map(|(d, v)| (*d, v - d.read(fork.affective(), fork.predictive())))
            .collect();
        Self {
            fork_id: fork.id(),
            actual,
            delta,
            recorded_at: Utc::now(),
        }
    }
}
