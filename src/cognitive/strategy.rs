//! Strategy trait and common helpers.

use super::ReasoningMode;
use crate::belief::ContextItem;

/// One reasoning mode's way of turning an input plus context into trace steps.
pub trait Strategy {
    fn mode(&self) -> ReasoningMode;

    /// Ordered reasoning steps for `input`. `context` is already ranked.
    /// Must return at least one step.
    fn reason(&self, input: &str, context: &[ContextItem]) -> Vec<String>;
}

/// The first sentence of `input`, terminator included. `None` when blank.
pub(crate) fn opening_sentence(input: &str) -> Option<&str> {
    input
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .find(|sentence| !sentence.is_empty())
}

/// Most frequent non-stopword terms; ties broken alphabetically.
pub(crate) fn top_keywords(s: &str, n: usize) -> Vec<String> {
    let mut v: Vec<(String, f64)> = crate::utils::text::term_counts(s).into_iter().collect();
    v.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v.into_iter().take(n).map(|(k, _)| k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_sentence() {
        assert_eq!(opening_sentence("Why did it fail? Logs say timeout."), Some("Why did it fail?"));
        assert_eq!(opening_sentence("  no terminator "), Some("no terminator"));
        assert_eq!(opening_sentence("   "), None);
    }

    #[test]
    fn test_top_keywords_is_deterministic() {
        let k = top_keywords("beta alpha beta gamma alpha beta", 2);
        assert_eq!(k, vec!["beta", "alpha"]);
        assert_eq!(top_keywords("zeta eta", 5), vec!["eta", "zeta"]);
    }
}
