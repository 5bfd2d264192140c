//! Text primitives shared by the evaluator, knowledge stores, and generators.
//!
//! Word lists live here as data so the heuristics that consume them can be
//! extended without touching control flow.

use regex::Regex;

use std::collections::HashSet;
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Lexicons
// ---------------------------------------------------------------------------

/// Tokens that signal explicit reasoning.
pub const LOGICAL_CONNECTORS: &[&str] = &[
    "because",
    "therefore",
    "if",
    "then",
    "thus",
    "hence",
    "since",
    "consequently",
    "so",
    "however",
    "although",
    "unless",
];

pub const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "happy", "love", "wonderful", "excellent", "glad", "enjoy", "helpful",
    "hope", "thanks", "thank", "amazing", "kind", "calm", "bright", "excited", "pleased",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "bad", "sad", "hate", "terrible", "awful", "angry", "upset", "worried", "afraid", "hurt",
    "poor", "wrong", "fear", "lonely", "tired", "annoyed", "painful", "disappointed",
];

/// Words that raise arousal regardless of polarity.
pub const INTENSIFIERS: &[&str] = &[
    "very", "really", "extremely", "incredibly", "absolutely", "so", "totally", "deeply",
];

/// Words that signal a dominant, directive stance.
pub const ASSERTIVE_WORDS: &[&str] = &[
    "must", "will", "should", "need", "definitely", "clearly", "certainly", "always",
];

// ---------------------------------------------------------------------------
// Regexes
// ---------------------------------------------------------------------------

static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("hard-coded regex is valid"));

/// Capitalized words stand in for named entities.
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-zA-Z]+\b").expect("hard-coded regex is valid"));

// ---------------------------------------------------------------------------
// Tokenization
// ---------------------------------------------------------------------------

/// Lowercased word tokens in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|word| word.trim_matches('\''))
        .filter(|word| !word.is_empty())
        .map(String::from)
        .collect()
}

/// Distinct lowercased tokens.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Distinct tokens preserving first-appearance order.
pub fn distinct_in_order<'a>(tokens: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .filter(|token| seen.insert(token.as_str()))
        .cloned()
        .collect()
}

/// Sentences with their terminal punctuation, trimmed. Fragments with no
/// alphanumeric content are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    SENTENCE_RE
        .find_iter(text)
        .map(|found| found.as_str().trim())
        .filter(|sentence| sentence.chars().any(char::is_alphanumeric))
        .collect()
}

/// Number of whitespace-separated words containing at least one alphanumeric.
pub fn word_count(sentence: &str) -> usize {
    sentence
        .split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .count()
}

/// Capitalized-word entities, lowercased for comparison.
pub fn extract_entities(text: &str) -> HashSet<String> {
    ENTITY_RE
        .find_iter(text)
        .map(|found| found.as_str().to_lowercase())
        .collect()
}

/// Count of tokens that appear in `lexicon`.
pub fn lexicon_hits(tokens: &[String], lexicon: &[&str]) -> usize {
    tokens
        .iter()
        .filter(|token| lexicon.contains(&token.as_str()))
        .count()
}

/// Distinct/total token ratio. Zero for empty input.
pub fn lexical_complexity(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    distinct.len() as f64 / tokens.len() as f64
}
