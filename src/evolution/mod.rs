//! Evolution Engine: proposes, tests, and commits bounded parameter mutations.
//!
//! Idle → Proposing → Testing → Committed | RolledBack → Idle
//!
//! The engine is the only writer of the state store. Bounds violations and
//! stale bases fail the proposal with an error before or at commit; a
//! candidate that fails testing or approval is rolled back, logged, and
//! reported as an outcome rather than an error.

pub mod approval;
pub mod mutation;
pub mod probe;

pub use approval::{ApprovalRequest, AutoApprove, CommitApproval, HoldForReview};
pub use mutation::{Mutation, MutationOrigin, ParamChange};
pub use probe::{HeldOutSample, TestReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::EvolutionConfig;
use crate::error::{ForkMindError, Result};
use crate::fork::{Fork, ValidationRecord};
use crate::learning::LearningProposal;
use crate::state::{CognitiveState, Limits, ParamField, StateOrigin, StateStore};
use crate::utils::math::hash_unit;

/// Number of evolution records kept for status reporting.
const LOG_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionPhase {
    Idle,
    Proposing,
    Testing,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RollbackReason {
    CurvatureExceeded { max_kappa: f64, limit: f64 },
    ValueRegressed { active: f64, candidate: f64 },
    ApprovalDenied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EvolutionOutcome {
    Committed {
        version: u64,
        changed: Vec<String>,
        report: TestReport,
    },
    RolledBack {
        active_version: u64,
        reason: RollbackReason,
        report: TestReport,
    },
}

impl EvolutionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, EvolutionOutcome::Committed { .. })
    }

    pub fn phase(&self) -> EvolutionPhase {
        match self {
            EvolutionOutcome::Committed { .. } => EvolutionPhase::Committed,
            EvolutionOutcome::RolledBack { .. } => EvolutionPhase::RolledBack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub generation: u64,
    pub base_version: u64,
    pub mutation: Mutation,
    pub outcome: EvolutionOutcome,
    pub recorded_at: DateTime<Utc>,
}

pub struct EvolutionEngine {
    store: Arc<StateStore>,
    limits: Limits,
    settings: EvolutionConfig,
    approval: Arc<dyn CommitApproval>,
    held_out: VecDeque<HeldOutSample>,
    phase: EvolutionPhase,
    generation: u64,
    validations_since_proposal: usize,
    log: VecDeque<EvolutionRecord>,
}

impl EvolutionEngine {
    pub fn new(store: Arc<StateStore>, limits: Limits, settings: EvolutionConfig) -> Self {
        let approval: Arc<dyn CommitApproval> = if settings.require_approval {
            Arc::new(HoldForReview)
        } else {
            Arc::new(AutoApprove)
        };
        Self {
            store,
            limits,
            settings,
            approval,
            held_out: VecDeque::new(),
            phase: EvolutionPhase::Idle,
            generation: 0,
            validations_since_proposal: 0,
            log: VecDeque::new(),
        }
    }

    pub fn set_approval(&mut self, approval: Arc<dyn CommitApproval>) {
        self.approval = approval;
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn history(&self) -> impl Iterator<Item = &EvolutionRecord> {
        self.log.iter()
    }

    pub fn last_outcome(&self) -> Option<&EvolutionOutcome> {
        self.log.back().map(|r| &r.outcome)
    }

    pub fn held_out_len(&self) -> usize {
        self.held_out.len()
    }

    /// Keep a validated fork for regression testing. Returns true once enough
    /// records have accumulated to trigger a proposal.
    pub fn record_validation(&mut self, fork: Fork, record: ValidationRecord) -> bool {
        self.held_out.push_back(HeldOutSample { fork, record });
        while self.held_out.len() > self.settings.held_out_capacity {
            self.held_out.pop_front();
        }
        self.validations_since_proposal += 1;
        self.validations_since_proposal >= self.settings.validation_trigger
    }

    /// Seeded single-field perturbation of `state` for the next generation.
    ///
    /// A step that clamps back onto the current value is retried in the other
    /// direction and then on the following fields. `None` only when no
    /// whitelisted field can move.
    pub fn sample_mutation(&self, state: &CognitiveState) -> Option<Mutation> {
        let generation = self.generation + 1;
        let fields = ParamField::all();
        let seed = self.settings.seed.to_le_bytes();
        let gen_bytes = generation.to_le_bytes();
        let pick = hash_unit(&[&seed, &gen_bytes, b"field"]);
        let start = ((pick * fields.len() as f64) as usize).min(fields.len() - 1);
        let u = hash_unit(&[&seed, &gen_bytes, b"step"]) * 2.0 - 1.0;

        for offset in 0..fields.len() {
            let field = fields[(start + offset) % fields.len()];
            let bounds = self.limits.bounds(field);
            let current = state.params.get(field);
            let step = if field.is_integral() {
                if u >= 0.0 { 1.0 } else { -1.0 }
            } else {
                let scale = match field {
                    ParamField::Alpha => self.limits.alpha_max,
                    _ => 1.0,
                };
                (u * self.settings.step_size * scale).clamp(-bounds.max_step, bounds.max_step)
            };
            for proposed in [current + step, current - step] {
                let value = proposed.clamp(bounds.min, bounds.max);
                if value.to_bits() != current.to_bits() {
                    return Some(Mutation {
                        changes: vec![ParamChange { field, value }],
                        origin: MutationOrigin::Random,
                        rationale: format!("generation {} perturbation of {}", generation, field),
                    });
                }
            }
            tracing::debug!("{} is pinned at {}; trying the next field", field, current);
        }
        None
    }

    /// Automatic proposal: sample a perturbation of the active state and test it.
    /// Resets the validation trigger.
    pub async fn evolve(&mut self) -> Result<EvolutionOutcome> {
        self.validations_since_proposal = 0;
        let base = self.store.pin();
        let Some(mutation) = self.sample_mutation(&base) else {
            tracing::warn!("no whitelisted parameter of v{} can move", base.version);
            return Err(ForkMindError::bounds(
                "evolution",
                "every whitelisted parameter is pinned at a bound",
            ));
        };
        self.propose_from(base, mutation).await
    }

    /// Propose `mutation` against the current active version.
    pub async fn propose(&mut self, mutation: Mutation) -> Result<EvolutionOutcome> {
        let base = self.store.pin();
        self.propose_from(base, mutation).await
    }

    pub async fn propose_learning(&mut self, proposal: &LearningProposal) -> Result<EvolutionOutcome> {
        let base = self.store.pin();
        if base.version != proposal.base_version {
            tracing::debug!(
                "learning proposal built on v{}, active is v{}",
                proposal.base_version,
                base.version
            );
        }
        self.propose_from(base, proposal.to_mutation()).await
    }

    /// Re-commit a retained version's whitelisted parameters as a new version.
    pub async fn revert_to(&mut self, version: u64) -> Result<EvolutionOutcome> {
        let target = self
            .store
            .get(version)
            .ok_or(ForkMindError::UnknownVersion { version })?;
        let base = self.store.pin();
        let changes: Vec<ParamChange> = ParamField::all()
            .into_iter()
            .filter(|f| target.params.get(*f).to_bits() != base.params.get(*f).to_bits())
            .map(|field| ParamChange {
                field,
                value: target.params.get(field),
            })
            .collect();
        if changes.is_empty() {
            return Err(ForkMindError::bounds(
                "revert",
                format!("v{} has the same parameters as the active v{}", version, base.version),
            ));
        }
        let mutation = Mutation {
            changes,
            origin: MutationOrigin::Revert,
            rationale: format!("revert to v{}", version),
        };
        self.propose_from(base, mutation).await
    }

    /// Run the full proposal pipeline against an explicit base snapshot.
    ///
    /// Fails with `BoundsViolation` before testing, or `StaleBase` at commit if
    /// `base` is no longer active. Either way the store is unchanged.
    pub async fn propose_from(
        &mut self,
        base: Arc<CognitiveState>,
        mutation: Mutation,
    ) -> Result<EvolutionOutcome> {
        self.generation += 1;
        self.phase = EvolutionPhase::Proposing;

        let candidate = match mutation.apply(&base.params, &self.limits) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("generation {} proposal rejected: {}", self.generation, e);
                self.phase = EvolutionPhase::Idle;
                return Err(e);
            }
        };
        if candidate.diff(&base.params).is_empty() {
            tracing::warn!(
                "generation {} proposal leaves v{} unchanged",
                self.generation,
                base.version
            );
            self.phase = EvolutionPhase::Idle;
            return Err(ForkMindError::bounds(
                "mutation",
                "every change equals the active value",
            ));
        }

        self.phase = EvolutionPhase::Testing;
        let report = probe::run(&self.settings.probe_inputs, &self.held_out, &base, &candidate).await;

        let rollback = if !report.kappa_ok() {
            Some(RollbackReason::CurvatureExceeded {
                max_kappa: report.max_kappa,
                limit: report.kappa_limit,
            })
        } else if !report.value_ok(self.settings.value_tolerance) {
            Some(RollbackReason::ValueRegressed {
                active: report.active_value,
                candidate: report.candidate_value,
            })
        } else {
            let request = ApprovalRequest {
                base: &base,
                candidate: &candidate,
                mutation: &mutation,
                report: &report,
            };
            if self.approval.approve(&request) {
                None
            } else {
                Some(RollbackReason::ApprovalDenied)
            }
        };

        let outcome = match rollback {
            Some(reason) => {
                tracing::warn!(
                    "generation {} rolled back ({:?}); v{} stays active",
                    self.generation,
                    reason,
                    base.version
                );
                EvolutionOutcome::RolledBack {
                    active_version: base.version,
                    reason,
                    report,
                }
            }
            None => {
                let origin = match mutation.origin {
                    MutationOrigin::Learning => StateOrigin::Learning,
                    MutationOrigin::Manual => StateOrigin::Manual,
                    MutationOrigin::Random => StateOrigin::Evolution,
                    MutationOrigin::Revert => StateOrigin::Revert {
                        from: base.version,
                    },
                };
                let changed = candidate.diff(&base.params);
                let committed = match self.store.commit(base.version, candidate, origin) {
                    Ok(state) => state,
                    Err(e) => {
                        tracing::warn!("generation {} commit failed: {}", self.generation, e);
                        self.phase = EvolutionPhase::Idle;
                        return Err(e);
                    }
                };
                tracing::info!(
                    "generation {} committed v{} ({} mutation of [{}])",
                    self.generation,
                    committed.version,
                    mutation.origin.as_str(),
                    changed.join(", ")
                );
                EvolutionOutcome::Committed {
                    version: committed.version,
                    changed,
                    report,
                }
            }
        };

        self.phase = outcome.phase();
        self.log.push_back(EvolutionRecord {
            generation: self.generation,
            base_version: base.version,
            mutation,
            outcome: outcome.clone(),
            recorded_at: Utc::now(),
        });
        while self.log.len() > LOG_CAPACITY {
            self.log.pop_front();
        }
        self.phase = EvolutionPhase::Idle;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::ContextSnapshot;
    use crate::evaluator::annotate;
    use crate::fork::{AffectDim, OutcomeVector};
    use crate::generator::generate;
    use crate::state::CognitiveParams;
    use crate::state::params::{WEIGHT_MAX, WEIGHT_MIN};

    fn engine() -> (Arc<StateStore>, EvolutionEngine) {
        let store = Arc::new(StateStore::new(CognitiveParams::default()));
        let engine = EvolutionEngine::new(
            Arc::clone(&store),
            Limits::default(),
            EvolutionConfig::default(),
        );
        (store, engine)
    }

    fn validated(store: &StateStore) -> (Fork, ValidationRecord) {
        let state = store.pin();
        let draft = generate("What is safety?", &ContextSnapshot::empty("q"), 1, &state, None).remove(0);
        let fork = annotate(draft, &state.params);
        let record = ValidationRecord::new(&fork, &OutcomeVector::new().with_harm(0.2));
        (fork, record)
    }

    #[tokio::test]
    async fn test_small_step_commits() {
        let (store, mut engine) = engine();
        let outcome = engine
            .propose(Mutation::manual().set(ParamField::KappaMax, 0.9))
            .await
            .unwrap();
        assert!(outcome.is_committed());
        assert_eq!(store.active_version(), 2);
        assert_eq!(store.pin().params.kappa_max, 0.9);
        assert_eq!(store.pin().origin, StateOrigin::Manual);
        assert_eq!(engine.phase(), EvolutionPhase::Idle);
    }

    #[tokio::test]
    async fn test_fear_extreme_rolls_back() {
        let (store, mut engine) = engine();
        let outcome = engine
            .propose(Mutation::manual().set(ParamField::AffectWeight(AffectDim::Fear), 3.0))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            EvolutionOutcome::RolledBack {
                reason: RollbackReason::CurvatureExceeded { .. },
                ..
            }
        ));
        assert_eq!(store.active_version(), 1);
        assert_eq!(store.pin().params, CognitiveParams::default());
    }

    #[tokio::test]
    async fn test_approval_hook_can_deny() {
        let (store, mut engine) = engine();
        engine.set_approval(Arc::new(HoldForReview));
        let outcome = engine
            .propose(Mutation::manual().set(ParamField::Alpha, 0.02))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            EvolutionOutcome::RolledBack {
                reason: RollbackReason::ApprovalDenied,
                ..
            }
        ));
        assert_eq!(store.active_version(), 1);
    }

    #[test]
    fn test_sampled_mutation_is_deterministic_and_in_bounds() {
        let (store, engine) = engine();
        let state = store.pin();
        let a = engine.sample_mutation(&state).unwrap();
        let b = engine.sample_mutation(&state).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.changes.len(), 1);
        assert!(a.apply(&state.params, engine.limits()).is_ok());
    }

    /// Every field at a bound: clamping must not hand back the current value
    #[test]
    fn test_sampled_mutation_never_clamps_to_a_noop() {
        let floor = CognitiveParams {
            affect_weights: [WEIGHT_MIN; 5],
            predictive_weights: [WEIGHT_MIN; 4],
            alpha: 0.0,
            kappa_max: 0.1,
            fork_depth: 1,
            retrieval_balance: 0.0,
            ..CognitiveParams::default()
        };
        let ceiling = CognitiveParams {
            affect_weights: [WEIGHT_MAX; 5],
            predictive_weights: [WEIGHT_MAX; 4],
            alpha: 0.05,
            kappa_max: 2.0,
            fork_depth: 12,
            retrieval_balance: 1.0,
            ..CognitiveParams::default()
        };
        for params in [floor, ceiling] {
            let store = Arc::new(StateStore::new(params));
            let state = store.pin();
            for seed in 0..40 {
                let settings = EvolutionConfig {
                    seed,
                    ..EvolutionConfig::default()
                };
                let engine = EvolutionEngine::new(Arc::clone(&store), Limits::default(), settings);
                let mutation = engine.sample_mutation(&state).unwrap();
                let candidate = mutation.apply(&state.params, engine.limits()).unwrap();
                assert_eq!(candidate.diff(&state.params).len(), 1, "seed {}", seed);
            }
        }
    }

    #[tokio::test]
    async fn test_unchanged_mutation_uses_no_history_slot() {
        let (store, mut engine) = engine();
        let err = engine
            .propose(Mutation::manual().set(ParamField::KappaMax, 0.8))
            .await
            .unwrap_err();
        assert!(matches!(err, ForkMindError::BoundsViolation { .. }));
        assert_eq!(store.active_version(), 1);
        assert_eq!(store.history_depth(), 1);
        assert_eq!(engine.phase(), EvolutionPhase::Idle);
    }

    #[test]
    fn test_validation_trigger() {
        let (store, mut engine) = engine();
        for _ in 0..2 {
            let (fork, record) = validated(&store);
            assert!(!engine.record_validation(fork, record));
        }
        let (fork, record) = validated(&store);
        assert!(engine.record_validation(fork, record));
        assert_eq!(engine.held_out_len(), 3);
    }

    #[tokio::test]
    async fn test_only_scheduled_evolution_resets_triggers() {
        let (store, mut engine) = engine();
        for _ in 0..3 {
            let (fork, record) = validated(&store);
            engine.record_validation(fork, record);
        }
        engine
            .propose(Mutation::manual().set(ParamField::KappaMax, 0.85))
            .await
            .unwrap();
        let (fork, record) = validated(&store);
        assert!(engine.record_validation(fork, record));

        engine.evolve().await.unwrap();
        let (fork, record) = validated(&store);
        assert!(!engine.record_validation(fork, record));
        assert_eq!(engine.generation(), 2);
        assert!(store.history_depth() >= 2);
    }
}
