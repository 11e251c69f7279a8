//! Pattern report over a rolling window of recent forks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cognitive::ReasoningMode;
use crate::fork::{AffectiveVector, Fork, ForkId};
use crate::utils::math::{column_means, mean, variance};

/// Number of most recent forks a report covers.
pub const DISCOVERY_WINDOW: usize = 20;

const LOW_CONFIDENCE: f64 = 0.5;
const HIGH_TENSION: f64 = 0.6;
const ELEVATED_FEAR: f64 = 0.5;
const HIGH_SATISFACTION: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub fork_count: usize,
    pub mean_confidence: f64,
    pub confidence_variance: f64,
    pub mean_curvature: f64,
    pub mode_distribution: BTreeMap<ReasoningMode, usize>,
    pub affective_centroid: AffectiveVector,
    /// Forks whose curvature is more than two standard deviations above the mean.
    pub anomalies: Vec<ForkId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub patterns: PatternReport,
    pub insight: String,
}

pub fn analyze(forks: &[Fork]) -> Option<PatternReport> {
    if forks.is_empty() {
        return None;
    }
    let confidences: Vec<f64> = forks.iter().map(|f| f.confidence()).collect();
    // non-finite curvature would poison every statistic below
    let curvatures: Vec<f64> = forks
        .iter()
        .map(|f| f.curvature())
        .filter(|k| k.is_finite())
        .collect();
    let mean_k = mean(&curvatures);
    let threshold = mean_k + 2.0 * variance(&curvatures).sqrt();

    let mut mode_distribution = BTreeMap::new();
    for f in forks {
        *mode_distribution.entry(f.mode()).or_insert(0) += 1;
    }
    let affect: Vec<[f64; 5]> = forks.iter().map(|f| f.affective().to_array()).collect();

    Some(PatternReport {
        fork_count: forks.len(),
        mean_confidence: mean(&confidences),
        confidence_variance: variance(&confidences),
        mean_curvature: mean_k,
        mode_distribution,
        affective_centroid: AffectiveVector::from_array(column_means(&affect)),
        anomalies: forks
            .iter()
            .filter(|f| f.curvature() > threshold)
            .map(|f| f.id())
            .collect(),
    })
}

pub fn insight(patterns: &PatternReport) -> String {
    let mut notes = Vec::new();
    if patterns.mean_confidence < LOW_CONFIDENCE {
        notes.push("Low confidence across forks; consider remembering more context".to_string());
    }
    if patterns.mean_curvature > HIGH_TENSION {
        notes.push("High relational tension; review kappa_max and field weights".to_string());
    }
    if patterns.affective_centroid.fear > ELEVATED_FEAR {
        notes.push("Elevated fear signal; high-risk domain".to_string());
    }
    if patterns.affective_centroid.satisfaction > HIGH_SATISFACTION {
        notes.push("High satisfaction signal; strong goal alignment".to_string());
    }
    if !patterns.anomalies.is_empty() {
        let ids: Vec<String> = patterns.anomalies.iter().map(|id| id.to_string()).collect();
        notes.push(format!("Anomalous forks: {}", ids.join(", ")));
    }
    if notes.is_empty() {
        "No significant patterns detected".to_string()
    } else {
        notes.join(" | ")
    }
}

pub fn discover(forks: &[Fork]) -> Option<DiscoveryReport> {
    let patterns = analyze(forks)?;
    let insight = insight(&patterns);
    Some(DiscoveryReport { patterns, insight })
}
