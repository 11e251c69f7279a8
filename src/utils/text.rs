//! Tokenization shared by routing, evaluation and belief relevance.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static word regex"));

const STOPWORDS: &[&str] = &[
    "the", "and", "or", "a", "an", "to", "of", "in", "on", "for", "with", "is", "are", "be",
    "this", "that", "what", "it",
];

/// Lowercased alphanumeric words, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Keywords from `keywords` that occur in `tokens`, deduplicated, in keyword order.
pub fn matched_keywords(tokens: &[String], keywords: &[&str]) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| tokens.iter().any(|t| t == *k))
        .map(|k| k.to_string())
        .collect()
}

/// Term frequencies with stopwords removed.
pub fn term_counts(text: &str) -> BTreeMap<String, f64> {
    let mut freq = BTreeMap::new();
    for w in tokenize(text) {
        if STOPWORDS.contains(&w.as_str()) {
            continue;
        }
        *freq.entry(w).or_insert(0.0) += 1.0;
    }
    freq
}

/// Cosine of two term-count bags; terms missing from either side count as
/// zero. 0.0 when the bags share no term.
pub fn term_similarity(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    let shared: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    if shared <= 0.0 {
        return 0.0;
    }
    let norm = |bag: &BTreeMap<String, f64>| bag.values().map(|v| v * v).sum::<f64>().sqrt();
    (shared / (norm(a) * norm(b))).clamp(0.0, 1.0)
}
