pub mod archive;
pub mod belief;
pub mod cognitive;
pub mod config;
pub mod curvature;
pub mod discovery;
pub mod error;
pub mod evaluator;
pub mod evolution;
pub mod fork;
pub mod generator;
pub mod learning;
pub mod mind;
pub mod selector;
pub mod state;
pub mod utils;
pub mod validation;

pub use crate::config::Config;
pub use crate::mind::{CycleOutcome, DrainReport, ForkMind, ProcessOptions, StatusReport};
pub use crate::error::{ForkMindError, Result};
pub use crate::fork::{Dimension, Fork, ForkId, OutcomeVector};
