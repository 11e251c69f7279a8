//! Mode routing: pick the primary reasoning mode for an input.
//!
//! Keyword heuristics over whole words. The result carries metadata (reason
//! and matched keywords) which the generator records as the first trace step
//! of every fork, so the routing decision is visible after the fact.

use super::ReasoningMode;
use crate::utils::text::{matched_keywords, tokenize};

/// Keywords that call for explanation (abductive)
pub const ABDUCTIVE_KEYWORDS: &[&str] = &["why", "cause", "reason", "explain"];

/// Keywords that signal universal rules (deductive)
pub const DEDUCTIVE_KEYWORDS: &[&str] = &["always", "never", "all", "every", "must"];

/// Metadata about how a mode was selected
#[derive(Debug, Clone, PartialEq)]
pub struct ModeRoutingResult {
    pub mode: ReasoningMode,
    pub reason: String,
    pub matched: Vec<String>,
}

impl ModeRoutingResult {
    /// Human-readable trace step describing the routing decision.
    pub fn trace_step(&self) -> String {
        if self.matched.is_empty() {
            format!("Mode routing: {} ({})", self.mode.as_str(), self.reason)
        } else {
            format!(
                "Mode routing: {} ({}: {})",
                self.mode.as_str(),
                self.reason,
                self.matched.join(", ")
            )
        }
    }
}

/// Route `content` to its primary mode.
///
/// The mode with more distinct keyword hits wins; abductive wins ties. No
/// hits falls back to inductive.
pub fn route_mode(content: &str) -> ModeRoutingResult {
    let tokens = tokenize(content);
    let abductive = matched_keywords(&tokens, ABDUCTIVE_KEYWORDS);
    let deductive = matched_keywords(&tokens, DEDUCTIVE_KEYWORDS);

    if abductive.is_empty() && deductive.is_empty() {
        return ModeRoutingResult {
            mode: ReasoningMode::Inductive,
            reason: "default, no routing keywords".to_string(),
            matched: Vec::new(),
        };
    }
    if abductive.len() >= deductive.len() {
        ModeRoutingResult {
            mode: ReasoningMode::Abductive,
            reason: "explanation keywords".to_string(),
            matched: abductive,
        }
    } else {
        ModeRoutingResult {
            mode: ReasoningMode::Deductive,
            reason: "universal-rule keywords".to_string(),
            matched: deductive,
        }
    }
}
