//! Validation ledger: what happened after forks were validated.
//!
//! Keeps a bounded log of validation records alongside the fork facts needed
//! to audit them, and derives two reports: systematic prediction bias, and
//! whether high curvature actually preceded harm.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::fork::{AffectDim, Dimension, Fork, PredictDim, ValidationRecord};
use crate::utils::math::{mean, variance};

/// Curvature above which a fork counts as "flagged" for harm audits.
pub const HIGH_KAPPA_THRESHOLD: f64 = 0.5;
/// Spread of risk errors above which predictions are called over-confident.
pub const OVERCONFIDENCE_SPREAD: f64 = 0.2;
/// Records with harm needed before curvature effectiveness is reported.
pub const MIN_HARM_SAMPLES: usize = 3;

const DEFAULT_LEDGER_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub record: ValidationRecord,
    pub curvature: f64,
    pub config_version: u64,
    /// Mean of the fork's predicted trust and satisfaction.
    pub predicted_sentiment: f64,
}

impl LedgerEntry {
    pub fn new(fork: &Fork, record: ValidationRecord) -> Self {
        let a = fork.affective();
        Self {
            record,
            curvature: fork.curvature(),
            config_version: fork.config_version(),
            predicted_sentiment: (a.trust + a.satisfaction) / 2.0,
        }
    }

    fn error(&self, dim: Dimension) -> f64 {
        self.record.delta.get(&dim).copied().unwrap_or(0.0)
    }

    /// Observed sentiment from whichever of trust and satisfaction were supplied.
    fn actual_sentiment(&self) -> Option<f64> {
        let observed: Vec<f64> = [AffectDim::Trust, AffectDim::Satisfaction]
            .into_iter()
            .filter_map(|d| self.record.actual.values.get(&Dimension::Affect(d)).copied())
            .collect();
        if observed.is_empty() {
            None
        } else {
            Some(mean(&observed))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasReport {
    /// Mean actual − predicted risk. Positive means risk is underestimated.
    pub risk_bias: f64,
    /// Mean actual − predicted reward. Positive means reward is underestimated.
    pub reward_bias: f64,
    /// 1 − |actual − predicted sentiment|, averaged over records that carry it.
    pub sentiment_accuracy: Option<f64>,
    pub overconfident: bool,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvatureEffectiveness {
    pub high_kappa_mean_harm: f64,
    pub low_kappa_mean_harm: f64,
    /// Whether flagged forks were followed by more harm. `None` when one
    /// side has no samples.
    pub effective: Option<bool>,
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct ValidationLedger {
    entries: VecDeque<LedgerEntry>,
    capacity: usize,
}

impl Default for ValidationLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

impl ValidationLedger {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, fork: &Fork, record: ValidationRecord) {
        self.entries.push_back(LedgerEntry::new(fork, record));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    pub fn detect_bias(&self) -> Option<BiasReport> {
        if self.entries.is_empty() {
            return None;
        }
        let risk: Vec<f64> = self
            .entries
            .iter()
            .map(|e| e.error(Dimension::Predict(PredictDim::Risk)))
            .collect();
        let reward: Vec<f64> = self
            .entries
            .iter()
            .map(|e| e.error(Dimension::Predict(PredictDim::Reward)))
            .collect();
        let sentiment: Vec<f64> = self
            .entries
            .iter()
            .filter_map(|e| {
                e.actual_sentiment()
                    .map(|actual| 1.0 - (actual - e.predicted_sentiment).abs())
            })
            .collect();

        Some(BiasReport {
            risk_bias: mean(&risk),
            reward_bias: mean(&reward),
            sentiment_accuracy: (!sentiment.is_empty()).then(|| mean(&sentiment)),
            overconfident: variance(&risk).sqrt() > OVERCONFIDENCE_SPREAD,
            sample_size: self.entries.len(),
        })
    }

    pub fn curvature_effectiveness(&self) -> Option<CurvatureEffectiveness> {
        let audited: Vec<(f64, f64)> = self
            .entries
            .iter()
            .filter_map(|e| e.record.actual.harm.map(|h| (e.curvature, h)))
            .collect();
        if audited.len() < MIN_HARM_SAMPLES {
            return None;
        }
        let samples = audited.len();
        let (high, low): (Vec<(f64, f64)>, Vec<(f64, f64)>) = audited
            .into_iter()
            .partition(|(kappa, _)| *kappa > HIGH_KAPPA_THRESHOLD);
        let high: Vec<f64> = high.into_iter().map(|(_, h)| h).collect();
        let low: Vec<f64> = low.into_iter().map(|(_, h)| h).collect();

        Some(CurvatureEffectiveness {
            high_kappa_mean_harm: mean(&high),
            low_kappa_mean_harm: mean(&low),
            effective: (!high.is_empty() && !low.is_empty()).then(|| mean(&high) > mean(&low)),
            samples,
        })
    }
}
