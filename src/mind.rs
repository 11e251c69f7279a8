//! `ForkMind`: the request cycle and everything that happens after it.
//!
//! A cycle pins the active cognitive state, generates N forks, evaluates them
//! in parallel, gates on curvature and selects one. Validations arrive later
//! through an unbounded queue and are drained either explicitly or by an
//! optional background worker; each one produces a bounded learning proposal
//! and feeds the evolution triggers.
//!
//! A request cycle never takes the evolution engine lock. Scheduled evolution
//! is counted with an atomic and runs on its own task.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;

use crate::archive::{ForkSink, InMemoryForkArchive};
use crate::belief::{BeliefStore, ContextSnapshot, InMemoryBeliefStore};
use crate::config::Config;
use crate::curvature::gate;
use crate::discovery::{DISCOVERY_WINDOW, DiscoveryReport, discover};
use crate::error::{ForkMindError, Result};
use crate::evaluator::annotate_batch;
use crate::evolution::{CommitApproval, EvolutionEngine, EvolutionOutcome, EvolutionRecord, Mutation};
use crate::fork::{Fork, ForkId, OutcomeVector, ValidationRecord};
use crate::generator::generate;
use crate::learning;
use crate::selector::select_from;
use crate::state::{CognitiveState, StateStore};
use crate::validation::{BiasReport, CurvatureEffectiveness, ValidationLedger};

/// Curvature penalty applied to each fork's confidence in the ensemble score.
const ENSEMBLE_KAPPA_PENALTY: f64 = 0.2;

/// Per-call overrides for a request cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Fork count for this cycle only; capped at the configured maximum.
    pub depth: Option<usize>,
    /// Fork this cycle follows up on, recorded on every generated fork.
    pub parent: Option<ForkId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub selected: Fork,
    /// Every fork of the cycle with its curvature, rejected ones included.
    pub forks: Vec<Fork>,
    /// True when no fork passed the gate and selection ran over the full set.
    pub degraded: bool,
    pub config_version: u64,
    pub ensemble_confidence: f64,
    pub response: String,
    /// True when this cycle started a scheduled evolution in the background.
    #[serde(default)]
    pub evolution_scheduled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub cycles_completed: u64,
    pub total_forks: u64,
    pub archived_forks: usize,
    pub active_config_version: u64,
    pub history_depth: usize,
    pub retained_versions: Vec<u64>,
    pub evolution_generation: u64,
    pub last_evolution_result: Option<EvolutionOutcome>,
    pub pending_validations: usize,
    pub validations_recorded: usize,
    pub held_out_samples: usize,
    pub beliefs: usize,
}

/// What one drain of the validation queue did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrainReport {
    pub processed: usize,
    pub evolution: Vec<EvolutionOutcome>,
    /// Proposals rejected before testing (bounds or stale base).
    pub rejected: Vec<String>,
}

/// Mean of confidence × (1 − 0.2κ). Forks with non-finite curvature are skipped.
pub fn ensemble_confidence(forks: &[Fork]) -> f64 {
    let scores: Vec<f64> = forks
        .iter()
        .filter(|f| f.curvature().is_finite())
        .map(|f| f.confidence() * (1.0 - f.curvature() * ENSEMBLE_KAPPA_PENALTY))
        .collect();
    crate::utils::math::mean(&scores)
}

struct PendingValidation {
    fork: Fork,
    outcome: OutcomeVector,
}

struct Shared {
    config: Config,
    store: Arc<StateStore>,
    engine: Mutex<EvolutionEngine>,
    beliefs: Arc<dyn BeliefStore>,
    archive: Arc<dyn ForkSink>,
    ledger: parking_lot::Mutex<ValidationLedger>,
    tx: mpsc::UnboundedSender<PendingValidation>,
    rx: Mutex<mpsc::UnboundedReceiver<PendingValidation>>,
    notify: Notify,
    pending: AtomicUsize,
    cycles: AtomicU64,
    cycles_since_evolution: AtomicU64,
    evolution_task: parking_lot::Mutex<Option<JoinHandle<Option<EvolutionOutcome>>>>,
    total_forks: AtomicU64,
}

pub struct ForkMind {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl ForkMind {
    /// Build a decision core with in-memory belief store and fork archive.
    pub fn new(config: Config) -> Result<Self> {
        let beliefs = Arc::new(InMemoryBeliefStore::new(
            config.belief.capacity,
            config.belief.top_k,
        ));
        Self::with_components(config, beliefs, Arc::new(InMemoryForkArchive::default()))
    }

    pub fn with_components(
        config: Config,
        beliefs: Arc<dyn BeliefStore>,
        archive: Arc<dyn ForkSink>,
    ) -> Result<Self> {
        config.validate().map_err(|e| ForkMindError::Config {
            message: e.to_string(),
        })?;
        let store = Arc::new(StateStore::new(config.cognition.clone()));
        let engine = EvolutionEngine::new(
            Arc::clone(&store),
            config.limits(),
            config.evolution.clone(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let spawn_worker = config.runtime.spawn_learning_worker;

        let mut mind = Self {
            shared: Arc::new(Shared {
                config,
                store,
                engine: Mutex::new(engine),
                beliefs,
                archive,
                ledger: parking_lot::Mutex::new(ValidationLedger::default()),
                tx,
                rx: Mutex::new(rx),
                notify: Notify::new(),
                pending: AtomicUsize::new(0),
                cycles: AtomicU64::new(0),
                cycles_since_evolution: AtomicU64::new(0),
                evolution_task: parking_lot::Mutex::new(None),
                total_forks: AtomicU64::new(0),
            }),
            worker: None,
        };
        if spawn_worker {
            mind.start_learning_worker();
        }
        Ok(mind)
    }

    /// Spawn the background task that drains validations as they arrive.
    /// No-op outside a tokio runtime or when a worker is already running.
    pub fn start_learning_worker(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime; learning worker not started");
            return;
        };
        let shared = Arc::clone(&self.shared);
        self.worker = Some(handle.spawn(async move {
            loop {
                shared.notify.notified().await;
                if let Err(e) = shared.drain().await {
                    tracing::warn!("learning worker drain failed: {}", e);
                }
            }
        }));
        tracing::debug!("learning worker started");
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// The currently active cognitive state.
    pub fn active_state(&self) -> Arc<CognitiveState> {
        self.shared.store.pin()
    }

    pub fn state_store(&self) -> Arc<StateStore> {
        Arc::clone(&self.shared.store)
    }

    pub fn archive(&self) -> Arc<dyn ForkSink> {
        Arc::clone(&self.shared.archive)
    }

    /// Run one request cycle. Always yields exactly one selected fork.
    pub async fn process(&self, input: &str, context: &ContextSnapshot) -> Result<CycleOutcome> {
        self.process_with(input, context, ProcessOptions::default()).await
    }

    pub async fn process_with(
        &self,
        input: &str,
        context: &ContextSnapshot,
        options: ProcessOptions,
    ) -> Result<CycleOutcome> {
        let shared = &self.shared;
        let state = shared.store.pin();
        let max_depth = shared.config.evolution.max_fork_depth;
        let depth = match options.depth {
            Some(d) if d > max_depth => {
                tracing::debug!("requested depth {} capped at {}", d, max_depth);
                max_depth
            }
            Some(d) => d,
            None => state.params.fork_depth,
        };
        tracing::debug!(
            "cycle start: v{} depth {} context items {}",
            state.version,
            depth,
            context.items.len()
        );

        let drafts = generate(input, context, depth, &state, options.parent);
        let evaluated = annotate_batch(drafts, &state.params).await;
        let gated = gate(evaluated, &state.params);
        let selected = select_from(&gated)
            .cloned()
            .ok_or_else(|| ForkMindError::Internal {
                message: "cycle produced no forks".into(),
            })?;

        shared.archive.archive(&gated.forks);
        shared.cycles.fetch_add(1, Ordering::Relaxed);
        shared
            .total_forks
            .fetch_add(gated.forks.len() as u64, Ordering::Relaxed);

        let ensemble = ensemble_confidence(&gated.forks);
        tracing::debug!(
            "cycle finish: selected {} ({}), kappa {:.3}, degraded {}",
            selected.id(),
            selected.mode(),
            selected.curvature(),
            gated.degraded
        );

        let evolution_scheduled = shared.schedule_evolution();

        Ok(CycleOutcome {
            response: selected.hypothesis().to_string(),
            selected,
            degraded: gated.degraded,
            config_version: state.version,
            ensemble_confidence: ensemble,
            forks: gated.forks,
            evolution_scheduled,
        })
    }

    /// Retrieve context for `input` from the belief store, then run a cycle.
    pub async fn process_query(&self, input: &str) -> Result<CycleOutcome> {
        let context = self.retrieve_context(input).await?;
        self.process(input, &context).await
    }

    pub async fn remember(&self, key: &str, value: &str, confidence: f64) -> Result<()> {
        self.shared.beliefs.remember(key, value, confidence).await
    }

    pub async fn retrieve_context(&self, query: &str) -> Result<ContextSnapshot> {
        self.shared.beliefs.retrieve_context(query).await
    }

    /// Queue ground truth for a previously produced fork.
    ///
    /// Returns immediately; learning happens on the next drain. An id that is
    /// not in the archive fails with `MissingValidationTarget` and changes
    /// nothing.
    pub fn validate_outcome(&self, fork_id: ForkId, outcome: OutcomeVector) -> Result<()> {
        let shared = &self.shared;
        let Some(fork) = shared.archive.get(fork_id) else {
            tracing::warn!("validation for unknown fork {}", fork_id);
            return Err(ForkMindError::MissingValidationTarget {
                fork_id: fork_id.to_string(),
            });
        };
        shared
            .tx
            .send(PendingValidation { fork, outcome })
            .map_err(|_| ForkMindError::QueueClosed)?;
        shared.pending.fetch_add(1, Ordering::Relaxed);
        shared.notify.notify_one();
        Ok(())
    }

    /// Process every queued validation now.
    pub async fn drain_validations(&self) -> Result<DrainReport> {
        self.shared.drain().await
    }

    /// Wait for the scheduled evolution most recently started by a cycle.
    /// `None` when none is outstanding or it was rejected before testing.
    pub async fn scheduled_evolution(&self) -> Option<EvolutionOutcome> {
        let task = self.shared.evolution_task.lock().take()?;
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("scheduled evolution task failed: {}", e);
                None
            }
        }
    }

    pub async fn status(&self) -> StatusReport {
        let shared = &self.shared;
        let engine = shared.engine.lock().await;
        let validations_recorded = shared.ledger.lock().len();
        StatusReport {
            cycles_completed: shared.cycles.load(Ordering::Relaxed),
            total_forks: shared.total_forks.load(Ordering::Relaxed),
            archived_forks: shared.archive.len(),
            active_config_version: shared.store.active_version(),
            history_depth: shared.store.history_depth(),
            retained_versions: shared.store.versions(),
            evolution_generation: engine.generation(),
            last_evolution_result: engine.last_outcome().cloned(),
            pending_validations: shared.pending.load(Ordering::Relaxed),
            validations_recorded,
            held_out_samples: engine.held_out_len(),
            beliefs: shared.beliefs.len().await,
        }
    }

    /// Submit an operator-built mutation through the full safety test.
    pub async fn propose_mutation(&self, mutation: Mutation) -> Result<EvolutionOutcome> {
        self.shared.engine.lock().await.propose(mutation).await
    }

    /// Run one automatic evolution step regardless of the schedule.
    pub async fn evolve_now(&self) -> Result<EvolutionOutcome> {
        self.shared.engine.lock().await.evolve().await
    }

    pub async fn revert_to(&self, version: u64) -> Result<EvolutionOutcome> {
        self.shared.engine.lock().await.revert_to(version).await
    }

    pub async fn set_approval(&self, approval: Arc<dyn CommitApproval>) {
        self.shared.engine.lock().await.set_approval(approval);
    }

    pub async fn evolution_history(&self) -> Vec<EvolutionRecord> {
        self.shared.engine.lock().await.history().cloned().collect()
    }

    /// Patterns over the most recently archived forks.
    pub fn discovery(&self) -> Option<DiscoveryReport> {
        discover(&self.shared.archive.recent(DISCOVERY_WINDOW))
    }

    pub fn bias_report(&self) -> Option<BiasReport> {
        self.shared.ledger.lock().detect_bias()
    }

    pub fn curvature_effectiveness(&self) -> Option<CurvatureEffectiveness> {
        self.shared.ledger.lock().curvature_effectiveness()
    }
}

impl Drop for ForkMind {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        if let Some(task) = self.shared.evolution_task.lock().take() {
            task.abort();
        }
    }
}

impl Shared {
    /// Count the finished cycle and, when evolution is due, start it on its
    /// own task. Returns whether a task was started.
    fn schedule_evolution(self: &Arc<Self>) -> bool {
        let since = self.cycles_since_evolution.fetch_add(1, Ordering::Relaxed) + 1;
        if since < self.config.evolution.every_cycles || !self.config.runtime.auto_evolve {
            return false;
        }
        let mut slot = self.evolution_task.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("scheduled evolution still running; deferring");
            return false;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime; scheduled evolution skipped");
            return false;
        };
        self.cycles_since_evolution.store(0, Ordering::Relaxed);
        let shared = Arc::clone(self);
        *slot = Some(handle.spawn(async move { shared.run_scheduled_evolution().await }));
        true
    }

    async fn run_scheduled_evolution(&self) -> Option<EvolutionOutcome> {
        let result = self.engine.lock().await.evolve().await;
        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!("scheduled evolution rejected: {}", e);
                None
            }
        }
    }

    async fn drain(&self) -> Result<DrainReport> {
        let mut rx = self.rx.lock().await;
        let mut report = DrainReport::default();

        while let Ok(PendingValidation { fork, outcome }) = rx.try_recv() {
            self.pending.fetch_sub(1, Ordering::Relaxed);
            report.processed += 1;

            let record = ValidationRecord::new(&fork, &outcome);
            self.ledger.lock().record(&fork, record.clone());

            let state = self.store.pin();
            let proposal = learning::update(&state, &fork, &record, &self.config.learning);
            let mut engine = self.engine.lock().await;
            if proposal.is_noop() {
                tracing::debug!("validation of {} produced no weight change", fork.id());
            } else {
                Self::collect(engine.propose_learning(&proposal).await, &mut report)?;
            }

            if engine.record_validation(fork, record) {
                self.cycles_since_evolution.store(0, Ordering::Relaxed);
                Self::collect(engine.evolve().await, &mut report)?;
            }
        }
        Ok(report)
    }

    fn collect(result: Result<EvolutionOutcome>, report: &mut DrainReport) -> Result<()> {
        match result {
            Ok(outcome) => {
                report.evolution.push(outcome);
                Ok(())
            }
            Err(e) if e.is_proposal_fatal() => {
                report.rejected.push(e.to_string());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
