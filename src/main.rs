//! fork-mind CLI
//!
//! Usage:
//!   fork-mind ask "What is safety?" --depth 3 --remember safety="Safety means avoiding harm"
//!   fork-mind demo

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fork_mind::fork::{AffectDim, PredictDim};
use fork_mind::{Config, Dimension, ForkMind, OutcomeVector, ProcessOptions};

#[derive(Parser)]
#[command(name = "fork-mind")]
#[command(about = "Parallel hypothesis generation with curvature-gated selection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one request cycle and print the outcome
    Ask {
        input: String,
        /// Number of forks for this cycle
        #[arg(long)]
        depth: Option<usize>,
        /// Override kappa_max for the initial configuration
        #[arg(long)]
        kappa_max: Option<f64>,
        /// Facts to remember before the cycle, as key=value
        #[arg(long = "remember", value_parser = parse_fact)]
        facts: Vec<(String, String)>,
    },
    /// Seed beliefs, run several cycles, validate one outcome, print status
    Demo,
}

fn parse_fact(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.runtime.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            input,
            depth,
            kappa_max,
            facts,
        } => {
            if let Some(k) = kappa_max {
                config.cognition.kappa_max = k;
            }
            ask(config, &input, depth, facts).await
        }
        Commands::Demo => demo(config).await,
    }
}

async fn ask(
    config: Config,
    input: &str,
    depth: Option<usize>,
    facts: Vec<(String, String)>,
) -> Result<()> {
    let mind = ForkMind::new(config).context("invalid configuration")?;
    for (key, value) in &facts {
        mind.remember(key, value, 1.0).await?;
    }
    let context = mind.retrieve_context(input).await?;
    let outcome = mind
        .process_with(input, &context, ProcessOptions { depth, parent: None })
        .await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn demo(config: Config) -> Result<()> {
    let mind = ForkMind::new(config).context("invalid configuration")?;
    info!("Starting fork-mind demo");

    let beliefs = [
        ("safety", "Safety means avoiding harm to people and systems", 0.9),
        ("release", "A release can fail when tests are skipped", 0.8),
        ("stability", "Stable systems stay consistent under change", 0.7),
    ];
    for (key, value, confidence) in beliefs {
        mind.remember(key, value, confidence).await?;
    }

    let questions = [
        "What is safety?",
        "Why did the release fail?",
        "Every release must be stable.",
        "How do we improve reliability?",
        "Is there a critical risk right now?",
    ];
    let mut cycles = Vec::new();
    for q in questions {
        let outcome = mind.process_query(q).await?;
        cycles.push(json!({
            "input": q,
            "selected": outcome.selected.id().to_string(),
            "mode": outcome.selected.mode(),
            "kappa": outcome.selected.curvature(),
            "degraded": outcome.degraded,
            "config_version": outcome.config_version,
            "response": outcome.response,
        }));
        if q.starts_with("Why") {
            mind.validate_outcome(
                outcome.selected.id(),
                OutcomeVector::new()
                    .with(Dimension::Predict(PredictDim::Risk), 0.7)
                    .with(Dimension::Affect(AffectDim::Trust), 0.4)
                    .with_harm(0.2),
            )?;
        }
    }
    let scheduled = mind.scheduled_evolution().await;
    let drained = mind.drain_validations().await?;

    let report = json!({
        "cycles": cycles,
        "scheduled_evolution": scheduled,
        "learning": drained,
        "status": mind.status().await,
        "discovery": mind.discovery(),
        "bias": mind.bias_report(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
