use anyhow::Result;

use fork_mind::belief::ContextSnapshot;
use fork_mind::config::LearningConfig;
use fork_mind::evaluator::annotate;
use fork_mind::fork::{Fork, ValidationRecord};
use fork_mind::generator::generate;
use fork_mind::learning;
use fork_mind::state::{CognitiveParams, StateStore};
use fork_mind::state::params::{WEIGHT_MAX, WEIGHT_MIN};
use fork_mind::{Config, Dimension, ForkMind, OutcomeVector};

const HOSTILE: [f64; 8] = [
    f64::NAN,
    f64::INFINITY,
    f64::NEG_INFINITY,
    1e300,
    -1e300,
    f64::MAX,
    f64::MIN_POSITIVE,
    -7.5,
];

fn annotated(params: &CognitiveParams, input: &str) -> (StateStore, Fork) {
    let store = StateStore::new(params.clone());
    let state = store.pin();
    let fork = generate(input, &ContextSnapshot::empty(input), 1, &state, None).remove(0);
    (store, annotate(fork, &state.params))
}

fn hostile_outcomes() -> Vec<OutcomeVector> {
    let mut out = Vec::new();
    for value in HOSTILE {
        out.push(Dimension::all().fold(OutcomeVector::new(), |o, d| o.with(d, value)));
        for dim in Dimension::all() {
            out.push(OutcomeVector::new().with(dim, value).with_harm(value));
        }
    }
    out
}

/// No outcome, however extreme, moves any weight further than the bound
#[test]
fn test_delta_never_exceeds_bound() {
    let cfg = LearningConfig::default();
    let inputs = [
        "Critical danger: unsafe harm is possible now.",
        "Why did the release fail with an error?",
        "We achieve great success with stable, reliable, robust systems.",
        "",
    ];
    for alpha in [0.0, 0.01, 0.05, 1.0e6] {
        let mut params = CognitiveParams::default();
        params.alpha = alpha;
        for input in inputs {
            let (store, fork) = annotated(&params, input);
            for outcome in hostile_outcomes() {
                let record = ValidationRecord::new(&fork, &outcome);
                let proposal = learning::update(&store.pin(), &fork, &record, &cfg);
                assert!(
                    proposal.max_abs_delta() <= cfg.max_weight_delta + 1e-12,
                    "alpha {} input '{}' moved a weight by {}",
                    alpha,
                    input,
                    proposal.max_abs_delta()
                );
                for step in &proposal.steps {
                    assert!(step.to.is_finite());
                    assert!((WEIGHT_MIN..=WEIGHT_MAX).contains(&step.to));
                }
            }
        }
    }
}

/// Weights already at the edge of their range stay inside it
#[test]
fn test_weights_at_range_edges_stay_in_range() {
    let cfg = LearningConfig::default();
    let mut params = CognitiveParams::default();
    params.alpha = 0.05;
    params.affect_weights = [WEIGHT_MAX, WEIGHT_MIN, WEIGHT_MAX, WEIGHT_MIN, WEIGHT_MAX];
    let (store, fork) = annotated(&params, "Critical danger, urgent now: we must solve the conflict");
    for outcome in hostile_outcomes() {
        let record = ValidationRecord::new(&fork, &outcome);
        let proposal = learning::update(&store.pin(), &fork, &record, &cfg);
        for step in &proposal.steps {
            assert!((WEIGHT_MIN..=WEIGHT_MAX).contains(&step.to));
        }
    }
}

/// Hostile outcomes pushed through the live queue leave the state valid
#[tokio::test]
async fn test_hostile_validations_keep_state_valid() -> Result<()> {
    let mut config = Config::default();
    config.runtime.auto_evolve = false;
    let mind = ForkMind::new(config.clone())?;
    let outcome = mind
        .process("Critical danger: unsafe harm is possible now.", &ContextSnapshot::empty("q"))
        .await?;

    for value in HOSTILE {
        for fork in &outcome.forks {
            let hostile = Dimension::all().fold(OutcomeVector::new(), |o, d| o.with(d, value));
            mind.validate_outcome(fork.id(), hostile)?;
        }
    }
    let report = mind.drain_validations().await?;
    assert_eq!(report.processed, HOSTILE.len() * outcome.forks.len());

    let active = mind.active_state();
    active.params.validate(&config.limits())?;
    for w in active.params.affect_weights.iter().chain(active.params.predictive_weights.iter()) {
        assert!(w.is_finite());
    }
    let status = mind.status().await;
    assert_eq!(status.pending_validations, 0);
    assert_eq!(status.validations_recorded, report.processed);
    Ok(())
}
