//! Abductive strategy: start from what needs explaining, pick the best fit.

use super::ReasoningMode;
use super::strategy::{Strategy, opening_sentence};
use crate::belief::ContextItem;

pub struct Abductive;

impl Strategy for Abductive {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::Abductive
    }

    fn reason(&self, input: &str, context: &[ContextItem]) -> Vec<String> {
        let mut steps: Vec<String> = context
            .iter()
            .take(1)
            .map(|c| format!("Observation: {}", c.content))
            .collect();
        if let Some(puzzle) = opening_sentence(input) {
            steps.push(format!("To be explained: {}", puzzle));
        }
        steps.push(format!(
            "Best explanation for '{}': inference to best fit",
            input.trim()
        ));
        steps
    }
}
