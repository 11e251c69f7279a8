use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};

use fork_mind::belief::ContextSnapshot;
use fork_mind::evolution::{ApprovalRequest, CommitApproval, Mutation};
use fork_mind::fork::AffectDim;
use fork_mind::state::{ParamField, StateOrigin};
use fork_mind::{Config, Dimension, ForkMind, OutcomeVector};

/// How long the approval hook stalls every candidate.
const HOOK_DELAY: Duration = Duration::from_millis(1500);
/// Upper bound for a request cycle that must not wait on the engine.
const CYCLE_BUDGET: Duration = Duration::from_millis(500);

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.runtime.auto_evolve = false;
    config
}

/// Approves everything after a long pause, standing in for human review.
struct SlowApprove;

impl CommitApproval for SlowApprove {
    fn approve(&self, _request: &ApprovalRequest<'_>) -> bool {
        std::thread::sleep(HOOK_DELAY);
        true
    }
}

fn fear(level: f64) -> OutcomeVector {
    OutcomeVector::new().with(Dimension::Affect(AffectDim::Fear), level)
}

async fn timed_cycle(mind: &ForkMind) -> Result<Duration> {
    let started = Instant::now();
    mind.process("What is safety?", &ContextSnapshot::empty("q"))
        .await?;
    Ok(started.elapsed())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cycle_does_not_wait_for_in_flight_proposal() -> Result<()> {
    let mind = Arc::new(ForkMind::new(quiet_config())?);
    mind.set_approval(Arc::new(SlowApprove)).await;

    let proposing = {
        let mind = Arc::clone(&mind);
        tokio::spawn(async move {
            mind.propose_mutation(Mutation::manual().set(ParamField::Alpha, 0.02))
                .await
        })
    };
    // give the proposal time to reach the approval hook
    sleep(Duration::from_millis(200)).await;

    let elapsed = timed_cycle(&mind).await?;
    assert!(!proposing.is_finished(), "proposal should still be under review");
    assert!(elapsed < CYCLE_BUDGET, "cycle waited {:?} on evolution", elapsed);

    assert!(proposing.await??.is_committed());
    assert_eq!(mind.active_state().version, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cycle_does_not_wait_for_validation_drain() -> Result<()> {
    let mind = Arc::new(ForkMind::new(quiet_config())?);
    let outcome = mind
        .process("Critical danger ahead", &ContextSnapshot::empty("q"))
        .await?;
    for _ in 0..3 {
        mind.validate_outcome(outcome.selected.id(), fear(1.0))?;
    }
    mind.set_approval(Arc::new(SlowApprove)).await;

    let draining = {
        let mind = Arc::clone(&mind);
        tokio::spawn(async move { mind.drain_validations().await })
    };
    sleep(Duration::from_millis(200)).await;

    let elapsed = timed_cycle(&mind).await?;
    assert!(!draining.is_finished(), "drain should still be running");
    assert!(elapsed < CYCLE_BUDGET, "cycle waited {:?} on the drain", elapsed);

    let report = draining.await??;
    assert_eq!(report.processed, 3);
    assert_eq!(mind.status().await.validations_recorded, 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scheduled_evolution_runs_off_the_request_path() -> Result<()> {
    let mut config = Config::default();
    config.evolution.every_cycles = 1;
    let mind = ForkMind::new(config)?;
    mind.set_approval(Arc::new(SlowApprove)).await;

    let started = Instant::now();
    let first = mind
        .process("What is safety?", &ContextSnapshot::empty("q"))
        .await?;
    assert!(started.elapsed() < CYCLE_BUDGET);
    assert!(first.evolution_scheduled);

    let elapsed = timed_cycle(&mind).await?;
    assert!(elapsed < CYCLE_BUDGET, "cycle waited {:?} on scheduled evolution", elapsed);

    mind.scheduled_evolution().await;
    assert!(mind.status().await.evolution_generation >= 1);
    Ok(())
}

/// With the worker enabled, queued outcomes are learned from without an explicit drain
#[tokio::test]
async fn test_learning_worker_consumes_queue() -> Result<()> {
    let mut config = quiet_config();
    config.runtime.spawn_learning_worker = true;
    // learning proposals only, no validation-triggered evolution
    config.evolution.validation_trigger = 100;
    let mind = ForkMind::new(config)?;

    let outcome = mind
        .process("Critical danger ahead", &ContextSnapshot::empty("q"))
        .await?;
    for _ in 0..2 {
        mind.validate_outcome(outcome.selected.id(), fear(1.0))?;
    }

    timeout(Duration::from_secs(5), async {
        while mind.status().await.held_out_samples < 2 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    let status = mind.status().await;
    assert_eq!(status.pending_validations, 0);
    assert_eq!(status.validations_recorded, 2);

    let active = mind.active_state();
    assert!(active.version > 1, "learning should have committed a version");
    assert_eq!(active.origin, StateOrigin::Learning);
    assert!(active.params.affect_weights[AffectDim::Fear.index()] > 1.0);
    assert_eq!(mind.drain_validations().await?.processed, 0);
    Ok(())
}
