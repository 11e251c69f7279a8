//! Cognitive State Store: the versioned configuration every cycle reads.

pub mod params;
pub mod store;

pub use params::{CognitiveParams, Limits, ModeWeights, ParamBounds, ParamField};
pub use store::{CognitiveState, HISTORY_DEPTH, StateOrigin, StateStore};
