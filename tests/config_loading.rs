use anyhow::Result;
use std::io::Write;

use fork_mind::Config;

#[test]
fn test_load_from_file_merges_with_defaults() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[cognition]
kappa_max = 0.6
fork_depth = 5
affect_weights = [1.0, 1.5, 1.0, 1.0, 1.0]

[evolution]
every_cycles = 10
probe_inputs = ["Is the bridge safe?"]

[belief]
top_k = 5
"#
    )?;

    let config = Config::load_from(file.path())?;
    assert_eq!(config.cognition.kappa_max, 0.6);
    assert_eq!(config.cognition.fork_depth, 5);
    assert_eq!(config.cognition.affect_weights[1], 1.5);
    assert_eq!(config.cognition.retrieval_balance, 0.6);
    assert_eq!(config.evolution.every_cycles, 10);
    assert_eq!(config.evolution.probe_inputs, vec!["Is the bridge safe?".to_string()]);
    assert_eq!(config.belief.top_k, 5);
    assert_eq!(config.learning.max_weight_delta, 0.05);
    config.validate()?;
    Ok(())
}

#[test]
fn test_missing_file_yields_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = Config::load_from(dir.path().join("absent.toml"))?;
    assert_eq!(config.cognition.kappa_max, 0.8);
    assert_eq!(config.evolution.seed, 7);
    Ok(())
}

#[test]
fn test_malformed_or_out_of_range_files_are_rejected() -> Result<()> {
    let mut broken = tempfile::NamedTempFile::new()?;
    writeln!(broken, "[cognition\nkappa_max = ")?;
    assert!(Config::load_from(broken.path()).is_err());

    let mut out_of_range = tempfile::NamedTempFile::new()?;
    writeln!(out_of_range, "[cognition]\nalpha = 0.9\n")?;
    let config = Config::load_from(out_of_range.path())?;
    assert!(config.validate().is_err());
    Ok(())
}

/// Env overrides apply on top of the file named by FORKMIND_CONFIG
#[test]
fn test_env_overrides_apply_after_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[cognition]\nkappa_max = 0.6\nfork_depth = 4\n")?;

    unsafe {
        std::env::set_var("FORKMIND_CONFIG", file.path());
        std::env::set_var("FORKMIND_ENV_FILE", file.path().with_extension("missing-env"));
        std::env::set_var("FORKMIND_FORK_DEPTH", "6");
        std::env::set_var("FORKMIND_SEED", "99");
        std::env::set_var("FORKMIND_AUTO_EVOLVE", "false");
    }

    let config = Config::load();

    unsafe {
        std::env::remove_var("FORKMIND_CONFIG");
        std::env::remove_var("FORKMIND_ENV_FILE");
        std::env::remove_var("FORKMIND_FORK_DEPTH");
        std::env::remove_var("FORKMIND_SEED");
        std::env::remove_var("FORKMIND_AUTO_EVOLVE");
    }

    let config = config?;
    assert_eq!(config.cognition.kappa_max, 0.6);
    assert_eq!(config.cognition.fork_depth, 6);
    assert_eq!(config.evolution.seed, 99);
    assert!(!config.runtime.auto_evolve);
    Ok(())
}
