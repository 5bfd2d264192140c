//! Response scoring rubric.
//!
//! Every sub-score is an independent heuristic in `[0, 1]`. The overall score
//! is never stored: [`Metrics::overall_score`] recomputes it from the
//! sub-scores with fixed weights that sum to one.

use crate::affect::{self, PersonalityVector, Trait};
use crate::config::KnowledgeVariant;
use crate::providers::{ProviderOutcome, Providers};
use crate::text;
use crate::truth;

use serde::{Deserialize, Serialize};

use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Scores for one (input, output) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub fluency: f64,
    pub semantic_accuracy: f64,
    pub abstract_reasoning: f64,
    pub context_awareness: f64,
    pub continuity: f64,
    /// Present only for the graph variant.
    pub emotional_resonance: Option<f64>,
    pub truth_compliance: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            fluency: 0.0,
            semantic_accuracy: 0.0,
            abstract_reasoning: 0.0,
            context_awareness: 0.0,
            continuity: 0.0,
            emotional_resonance: None,
            truth_compliance: true,
        }
    }
}

impl Metrics {
    pub fn truth_score(&self) -> f64 {
        if self.truth_compliance { 1.0 } else { 0.0 }
    }

    /// Weighted combination of the sub-scores.
    pub fn overall_score(&self) -> f64 {
        MetricWeights::for_metrics(self).combine(self)
    }
}

/// Fixed convex weights over the sub-scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricWeights {
    pub fluency: f64,
    pub semantic_accuracy: f64,
    pub abstract_reasoning: f64,
    pub context_awareness: f64,
    pub continuity: f64,
    pub emotional_resonance: f64,
    pub truth_compliance: f64,
}

/// Weights used when no emotional resonance is scored.
pub const BASIC_WEIGHTS: MetricWeights = MetricWeights {
    fluency: 0.20,
    semantic_accuracy: 0.25,
    abstract_reasoning: 0.20,
    context_awareness: 0.15,
    continuity: 0.10,
    emotional_resonance: 0.0,
    truth_compliance: 0.10,
};

/// Weights used when emotional resonance is scored.
pub const GRAPH_WEIGHTS: MetricWeights = MetricWeights {
    fluency: 0.15,
    semantic_accuracy: 0.25,
    abstract_reasoning: 0.15,
    context_awareness: 0.15,
    continuity: 0.10,
    emotional_resonance: 0.10,
    truth_compliance: 0.10,
};

impl MetricWeights {
    pub fn for_metrics(metrics: &Metrics) -> Self {
        if metrics.emotional_resonance.is_some() {
            GRAPH_WEIGHTS
        } else {
            BASIC_WEIGHTS
        }
    }

    pub fn total(&self) -> f64 {
        self.fluency
            + self.semantic_accuracy
            + self.abstract_reasoning
            + self.context_awareness
            + self.continuity
            + self.emotional_resonance
            + self.truth_compliance
    }

    pub fn combine(&self, metrics: &Metrics) -> f64 {
        let sum = self.fluency * metrics.fluency
            + self.semantic_accuracy * metrics.semantic_accuracy
            + self.abstract_reasoning * metrics.abstract_reasoning
            + self.context_awareness * metrics.context_awareness
            + self.continuity * metrics.continuity
            + self.emotional_resonance * metrics.emotional_resonance.unwrap_or(0.0)
            + self.truth_compliance * metrics.truth_score();
        sum.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Scores outputs, consulting optional providers where available.
#[derive(Debug, Clone)]
pub struct MetricsEvaluator {
    providers: Providers,
    score_emotion: bool,
}

impl MetricsEvaluator {
    pub fn new(providers: Providers, variant: KnowledgeVariant) -> Self {
        Self {
            providers,
            score_emotion: variant == KnowledgeVariant::Graph,
        }
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    /// Score `output` as a reply to `input`. `context` adds prior-turn
    /// entities to the context-awareness check.
    pub async fn evaluate(
        &self,
        input: &str,
        output: &str,
        context: Option<&str>,
        personality: &PersonalityVector,
    ) -> Metrics {
        let emotional_resonance = if self.score_emotion {
            Some(self.emotional_resonance(output, personality).await)
        } else {
            None
        };

        Metrics {
            fluency: fluency(output),
            semantic_accuracy: self.semantic_accuracy(input, output).await,
            abstract_reasoning: abstract_reasoning(output),
            context_awareness: context_awareness(input, output, context),
            continuity: continuity(output),
            emotional_resonance,
            truth_compliance: truth::is_compliant(output),
        }
    }

    /// Embedding cosine when an embedder answers, token overlap otherwise.
    pub async fn semantic_accuracy(&self, input: &str, output: &str) -> f64 {
        let input_vector = match self.providers.embed(input).await {
            ProviderOutcome::Available(vector) => vector,
            ProviderOutcome::Unavailable | ProviderOutcome::Failed(_) => {
                return token_overlap(input, output);
            }
        };
        match self.providers.embed(output).await {
            ProviderOutcome::Available(output_vector) => {
                cosine_similarity(&input_vector, &output_vector).clamp(0.0, 1.0)
            }
            ProviderOutcome::Unavailable | ProviderOutcome::Failed(_) => {
                token_overlap(input, output)
            }
        }
    }

    /// Classifier intensity blended with personality alignment; lexicon
    /// sentiment scaled by expressiveness when no classifier answers.
    pub async fn emotional_resonance(&self, output: &str, personality: &PersonalityVector) -> f64 {
        match self.providers.classify(output).await {
            ProviderOutcome::Available(classification) => {
                let signed = classification.signed_score();
                let mut features = affect::trait_features(output);
                features[Trait::Expressiveness as usize] = signed.abs();
                features[Trait::Warmth as usize] = signed;
                let alignment = personality.alignment(&features);
                (0.6 * signed.abs() + 0.4 * (alignment + 1.0) / 2.0).clamp(0.0, 1.0)
            }
            ProviderOutcome::Unavailable | ProviderOutcome::Failed(_) => {
                lexicon_resonance(output, personality)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-score heuristics
// ---------------------------------------------------------------------------

/// Mean per-sentence score from word count.
pub fn fluency(output: &str) -> f64 {
    let sentences = text::split_sentences(output);
    if sentences.is_empty() {
        return 0.0;
    }
    let total: f64 = sentences
        .iter()
        .map(|sentence| match text::word_count(sentence) {
            count if count >= 3 => 0.7,
            2 => 0.4,
            _ => 0.1,
        })
        .sum();
    total / sentences.len() as f64
}

/// Share of distinct input tokens echoed by the output.
pub fn token_overlap(input: &str, output: &str) -> f64 {
    let input_tokens = text::token_set(input);
    if input_tokens.is_empty() {
        return 0.0;
    }
    let output_tokens = text::token_set(output);
    let overlap = input_tokens.intersection(&output_tokens).count();
    (overlap as f64 / input_tokens.len() as f64).min(1.0)
}

/// Logical connectors per three, capped at one.
pub fn abstract_reasoning(output: &str) -> f64 {
    let tokens = text::tokenize(output);
    (text::lexicon_hits(&tokens, text::LOGICAL_CONNECTORS) as f64 / 3.0).min(1.0)
}

/// Share of input (and context) entities the output mentions. Neutral 0.5
/// when there are no entities to track.
pub fn context_awareness(input: &str, output: &str, context: Option<&str>) -> f64 {
    let mut tracked: HashSet<String> = text::extract_entities(input);
    if let Some(context) = context {
        tracked.extend(text::extract_entities(context));
    }
    if tracked.is_empty() {
        return 0.5;
    }
    let mentioned = text::extract_entities(output);
    tracked.intersection(&mentioned).count() as f64 / tracked.len() as f64
}

/// Mean shared-word score over consecutive sentence pairs; two shared words
/// saturate a pair. Single-sentence outputs score 0.5.
pub fn continuity(output: &str) -> f64 {
    let sentences = text::split_sentences(output);
    if sentences.len() < 2 {
        return 0.5;
    }
    let sets: Vec<HashSet<String>> = sentences.iter().map(|s| text::token_set(s)).collect();
    let total: f64 = sets
        .windows(2)
        .map(|pair| (pair[0].intersection(&pair[1]).count() as f64 / 2.0).min(1.0))
        .sum();
    total / (sets.len() - 1) as f64
}

/// Net lexicon sentiment magnitude scaled by the expressiveness trait.
pub fn lexicon_resonance(output: &str, personality: &PersonalityVector) -> f64 {
    let net = affect::net_sentiment(&text::tokenize(output)).abs();
    let expressiveness = personality.get(Trait::Expressiveness).max(0.0);
    (net * (0.5 + 0.5 * expressiveness)).clamp(0.0, 1.0)
}

/// Cosine similarity; zero for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
