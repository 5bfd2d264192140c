//! Truth-compliance predicates.
//!
//! Three independent checks, each a plain function over text or token
//! sequences: antonym co-occurrence within a sentence, hallucination-indicator
//! phrases, and cross-sentence negation mismatch on otherwise overlapping
//! sentences. An output is compliant only when all three pass.

use crate::text;

use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Pattern data
// ---------------------------------------------------------------------------

/// Pairs that cannot both describe the same thing in one sentence.
pub const ANTONYM_PAIRS: &[(&str, &str)] = &[
    ("always", "never"),
    ("true", "false"),
    ("alive", "dead"),
    ("possible", "impossible"),
    ("everyone", "nobody"),
    ("everything", "nothing"),
    ("all", "none"),
    ("increase", "decrease"),
    ("correct", "incorrect"),
    ("win", "lose"),
];

/// Phrases that overclaim certainty or invent first-hand experience.
pub const HALLUCINATION_PHRASES: &[&str] = &[
    "i know for certain",
    "i am absolutely certain",
    "it is a proven fact",
    "100% guaranteed",
    "everyone knows that",
    "studies have proven",
    "i personally witnessed",
    "i remember when i",
    "without any doubt",
];

pub const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't", "won't",
    "can't", "cannot", "shouldn't", "nor",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "it", "its", "of", "in", "to", "for",
    "on", "at", "and", "or", "but", "this", "that",
];

/// Minimum Jaccard overlap for two sentences to count as the same claim.
const CLAIM_OVERLAP_THRESHOLD: f64 = 0.5;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Which check (if any) an output failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TruthReport {
    pub antonym_pair: Option<(&'static str, &'static str)>,
    pub hallucination: Option<&'static str>,
    /// Indices of the two conflicting sentences.
    pub cross_sentence: Option<(usize, usize)>,
}

impl TruthReport {
    pub fn is_compliant(&self) -> bool {
        self.antonym_pair.is_none() && self.hallucination.is_none() && self.cross_sentence.is_none()
    }
}

/// Run all three checks over `output`.
pub fn check(output: &str) -> TruthReport {
    let sentences = text::split_sentences(output);
    TruthReport {
        antonym_pair: sentences
            .iter()
            .find_map(|sentence| find_antonym_pair(&text::tokenize(sentence))),
        hallucination: find_hallucination_phrase(output),
        cross_sentence: find_cross_sentence_contradiction(&sentences),
    }
}

/// Shorthand for `check(output).is_compliant()`.
pub fn is_compliant(output: &str) -> bool {
    check(output).is_compliant()
}

/// Fraction of sentences that pass the single-sentence checks on their own.
/// An output with no sentences is fully stratified (1.0).
pub fn stratification(output: &str) -> f64 {
    let sentences = text::split_sentences(output);
    if sentences.is_empty() {
        return 1.0;
    }
    let passing = sentences
        .iter()
        .filter(|sentence| {
            find_antonym_pair(&text::tokenize(sentence)).is_none()
                && find_hallucination_phrase(sentence).is_none()
        })
        .count();
    passing as f64 / sentences.len() as f64
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// First antonym pair whose members both occur in `tokens`.
pub fn find_antonym_pair(tokens: &[String]) -> Option<(&'static str, &'static str)> {
    let present: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    ANTONYM_PAIRS
        .iter()
        .find(|(left, right)| present.contains(left) && present.contains(right))
        .copied()
}

/// First hallucination phrase contained in `output` (case and spacing
/// insensitive).
pub fn find_hallucination_phrase(output: &str) -> Option<&'static str> {
    let normalized = output
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    HALLUCINATION_PHRASES
        .iter()
        .find(|phrase| normalized.contains(*phrase))
        .copied()
}

/// First pair of sentences that make the same claim with opposite polarity.
pub fn find_cross_sentence_contradiction(sentences: &[&str]) -> Option<(usize, usize)> {
    let analyzed: Vec<(HashSet<String>, bool)> = sentences
        .iter()
        .map(|sentence| {
            let tokens = text::tokenize(sentence);
            (claim_tokens(&tokens), is_negated(&tokens))
        })
        .collect();

    for (i, (claim_a, negated_a)) in analyzed.iter().enumerate() {
        for (j, (claim_b, negated_b)) in analyzed.iter().enumerate().skip(i + 1) {
            if negated_a != negated_b && jaccard(claim_a, claim_b) > CLAIM_OVERLAP_THRESHOLD {
                return Some((i, j));
            }
        }
    }
    None
}

pub fn is_negated(tokens: &[String]) -> bool {
    tokens
        .iter()
        .any(|token| NEGATION_WORDS.contains(&token.as_str()))
}

fn claim_tokens(tokens: &[String]) -> HashSet<String> {
    tokens
        .iter()
        .filter(|token| {
            !NEGATION_WORDS.contains(&token.as_str()) && !STOP_WORDS.contains(&token.as_str())
        })
        .cloned()
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
