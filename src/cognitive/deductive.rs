//! Deductive strategy: premises first, then the conclusion they license.

use super::ReasoningMode;
use super::strategy::{Strategy, top_keywords};
use crate::belief::ContextItem;

pub struct Deductive;

impl Strategy for Deductive {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::Deductive
    }

    fn reason(&self, input: &str, context: &[ContextItem]) -> Vec<String> {
        let mut steps: Vec<String> = context
            .iter()
            .take(2)
            .map(|c| format!("Given: {}", c.content))
            .collect();
        let terms = top_keywords(input, 3);
        if !terms.is_empty() {
            steps.push(format!("Rule terms: {}", terms.join(", ")));
        }
        steps.push(format!(
            "Therefore, regarding '{}': applying rule-based inference",
            input.trim()
        ));
        steps
    }
}
