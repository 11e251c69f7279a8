//! Inductive strategy: generalise from observed patterns.

use super::ReasoningMode;
use super::strategy::Strategy;
use crate::belief::ContextItem;

pub struct Inductive;

impl Strategy for Inductive {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::Inductive
    }

    fn reason(&self, input: &str, context: &[ContextItem]) -> Vec<String> {
        let mut steps: Vec<String> = context
            .iter()
            .take(2)
            .map(|c| format!("Pattern observed: {}", c.content))
            .collect();
        if context.len() > 1 {
            steps.push(format!("{} sources point the same way", context.len().min(2)));
        }
        steps.push(format!("Generalizing from patterns to '{}'", input.trim()));
        steps
    }
}
