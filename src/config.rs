use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::state::{CognitiveParams, Limits};

/// Main configuration structure loaded from fork_mind.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Initial cognitive parameters (version 1 of the state store)
    pub cognition: CognitiveParams,
    pub learning: LearningConfig,
    pub evolution: EvolutionConfig,
    pub belief: BeliefConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Bounded learning step configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Largest change any single weight may receive from one validation record
    pub max_weight_delta: f64,
    /// Finite-difference half-width for the gradient estimate
    pub fd_epsilon: f64,
    pub alpha_min: f64,
    pub alpha_max: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_weight_delta: 0.05,
            fd_epsilon: 1e-4,
            alpha_min: 0.0,
            alpha_max: 0.05,
        }
    }
}

/// Evolution engine cadence, safety test, and parameter ranges
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Propose an automatic mutation every N request cycles
    pub every_cycles: u64,
    /// Propose after this many accumulated validation records
    pub validation_trigger: usize,
    /// Scale of automatic perturbations
    pub step_size: f64,
    /// Largest tolerated drop in aggregate value
    pub value_tolerance: f64,
    pub seed: u64,
    pub held_out_capacity: usize,
    /// Synthetic inputs pooled into one probe batch during testing
    pub probe_inputs: Vec<String>,
    /// Hold every candidate for an external approval hook instead of auto-approving
    pub require_approval: bool,
    pub kappa_min: f64,
    pub kappa_ceiling: f64,
    pub max_fork_depth: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            every_cycles: 5,
            validation_trigger: 3,
            step_size: 0.1,
            value_tolerance: 0.02,
            seed: 7,
            held_out_capacity: 32,
            probe_inputs: default_probe_inputs(),
            require_approval: false,
            kappa_min: 0.1,
            kappa_ceiling: 2.0,
            max_fork_depth: 12,
        }
    }
}

pub fn default_probe_inputs() -> Vec<String> {
    [
        "What is safety?",
        "Why did the release fail with an error?",
        "The system must stay stable and consistent.",
        "Critical danger: unsafe harm is possible now.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// In-memory belief store sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BeliefConfig {
    pub capacity: usize,
    pub top_k: usize,
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            top_k: 3,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: String,
    pub auto_evolve: bool,
    pub spawn_learning_worker: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "fork_mind=info".to_string(),
            auto_evolve: true,
            spawn_learning_worker: false,
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "fork_mind=info".to_string()),
            auto_evolve: std::env::var("FORKMIND_AUTO_EVOLVE")
                .ok()
                .is_none_or(|v| v != "false" && v != "0"),
            spawn_learning_worker: std::env::var("FORKMIND_LEARNING_WORKER")
                .ok()
                .is_some_and(|v| v == "true" || v == "1"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses FORKMIND_CONFIG environment variable or defaults to "fork_mind.toml"
    pub fn load() -> anyhow::Result<Self> {
        // FORKMIND_ENV_FILE if set, otherwise ./.env
        if let Ok(env_path) = std::env::var("FORKMIND_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
        }

        let config_path =
            std::env::var("FORKMIND_CONFIG").unwrap_or_else(|_| "fork_mind.toml".to_string());
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file without env overrides. A missing file yields defaults.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Ok(content) = std::fs::read_to_string(path) {
            Self::from_toml_str(&content)
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(depth) = env_parse::<usize>("FORKMIND_FORK_DEPTH") {
            self.cognition.fork_depth = depth;
            tracing::debug!("FORKMIND_FORK_DEPTH env override applied");
        }
        if let Some(kappa) = env_parse::<f64>("FORKMIND_KAPPA_MAX") {
            self.cognition.kappa_max = kappa;
            tracing::debug!("FORKMIND_KAPPA_MAX env override applied");
        }
        if let Some(alpha) = env_parse::<f64>("FORKMIND_ALPHA") {
            self.cognition.alpha = alpha;
            tracing::debug!("FORKMIND_ALPHA env override applied");
        }
        if let Some(balance) = env_parse::<f64>("FORKMIND_RETRIEVAL_BALANCE") {
            self.cognition.retrieval_balance = balance;
            tracing::debug!("FORKMIND_RETRIEVAL_BALANCE env override applied");
        }
        if let Some(every) = env_parse::<u64>("FORKMIND_EVOLVE_EVERY") {
            self.evolution.every_cycles = every;
            tracing::debug!("FORKMIND_EVOLVE_EVERY env override applied");
        }
        if let Some(seed) = env_parse::<u64>("FORKMIND_SEED") {
            self.evolution.seed = seed;
            tracing::debug!("FORKMIND_SEED env override applied");
        }
    }

    /// Parameter ranges derived from the learning and evolution sections.
    pub fn limits(&self) -> Limits {
        Limits {
            alpha_min: self.learning.alpha_min,
            alpha_max: self.learning.alpha_max,
            kappa_min: self.evolution.kappa_min,
            kappa_ceiling: self.evolution.kappa_ceiling,
            max_fork_depth: self.evolution.max_fork_depth,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let l = &self.learning;
        if !(l.max_weight_delta.is_finite() && l.max_weight_delta > 0.0) {
            anyhow::bail!("learning.max_weight_delta must be a positive number");
        }
        if !(l.fd_epsilon.is_finite() && l.fd_epsilon > 0.0) {
            anyhow::bail!("learning.fd_epsilon must be a positive number");
        }
        if !(l.alpha_min >= 0.0 && l.alpha_min <= l.alpha_max && l.alpha_max.is_finite()) {
            anyhow::bail!(
                "learning alpha range [{}, {}] is invalid",
                l.alpha_min,
                l.alpha_max
            );
        }

        let e = &self.evolution;
        if e.every_cycles == 0 {
            anyhow::bail!("evolution.every_cycles must be >= 1");
        }
        if e.validation_trigger == 0 {
            anyhow::bail!("evolution.validation_trigger must be >= 1");
        }
        if !(e.step_size.is_finite() && e.step_size > 0.0) {
            anyhow::bail!("evolution.step_size must be a positive number");
        }
        if !(e.value_tolerance.is_finite() && e.value_tolerance >= 0.0) {
            anyhow::bail!("evolution.value_tolerance must be >= 0");
        }
        if e.held_out_capacity == 0 {
            anyhow::bail!("evolution.held_out_capacity must be >= 1");
        }
        if e.probe_inputs.is_empty() {
            anyhow::bail!("evolution.probe_inputs must not be empty");
        }
        if !(e.kappa_min > 0.0 && e.kappa_min < e.kappa_ceiling && e.kappa_ceiling.is_finite()) {
            anyhow::bail!(
                "evolution kappa range [{}, {}] is invalid",
                e.kappa_min,
                e.kappa_ceiling
            );
        }
        if e.max_fork_depth == 0 {
            anyhow::bail!("evolution.max_fork_depth must be >= 1");
        }

        if self.belief.capacity == 0 || self.belief.top_k == 0 {
            anyhow::bail!("belief.capacity and belief.top_k must be >= 1");
        }

        self.cognition.validate(&self.limits())?;
        Ok(())
    }
}
