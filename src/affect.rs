//! Emotional and personality state.
//!
//! - [`PersonalityVector`]: unit-length trait vector that biases resonance
//!   scoring and drifts toward whatever the scaffold does better.
//! - [`EmotionalReading`]: valence/arousal/dominance read from a single text.
//! - [`EmotionalHistory`]: bounded log of readings for emitted outputs.
//! - [`PrimaryEmotions`]: eight decaying primary emotions fed by readings.

use crate::providers::Classification;
use crate::text;

use serde::{Deserialize, Serialize};

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Personality
// ---------------------------------------------------------------------------

/// Personality axes, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    Expressiveness,
    Structure,
    Rigor,
    Warmth,
    Curiosity,
    Assertiveness,
}

pub const TRAIT_COUNT: usize = 6;

impl Trait {
    pub const ALL: [Trait; TRAIT_COUNT] = [
        Trait::Expressiveness,
        Trait::Structure,
        Trait::Rigor,
        Trait::Warmth,
        Trait::Curiosity,
        Trait::Assertiveness,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Step applied per observed feature gap during a learning comparison.
const PERSONALITY_STEP: f64 = 0.05;

/// Unit-length vector in `[-1, 1]^k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityVector {
    values: Vec<f64>,
}

impl Default for PersonalityVector {
    fn default() -> Self {
        let component = 1.0 / (TRAIT_COUNT as f64).sqrt();
        Self {
            values: vec![component; TRAIT_COUNT],
        }
    }
}

impl PersonalityVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, axis: Trait) -> f64 {
        self.values.get(axis.index()).copied().unwrap_or(0.0)
    }

    /// Apply a batch of increments, clamp to `[-1, 1]`, then renormalize.
    ///
    /// A batch that cancels the vector out entirely resets it to the default.
    pub fn adjust(&mut self, adjustments: &[(Trait, f64)]) {
        if adjustments.is_empty() {
            return;
        }
        if self.values.len() != TRAIT_COUNT {
            *self = Self::default();
        }
        for (axis, delta) in adjustments {
            let slot = &mut self.values[axis.index()];
            *slot = (*slot + delta).clamp(-1.0, 1.0);
        }
        let norm = self.values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            *self = Self::default();
            return;
        }
        for value in &mut self.values {
            *value /= norm;
        }
    }

    /// Cosine similarity with a feature vector, in `[-1, 1]`. Zero when either
    /// side has no magnitude.
    pub fn alignment(&self, features: &[f64; TRAIT_COUNT]) -> f64 {
        let dot: f64 = self.values.iter().zip(features).map(|(a, b)| a * b).sum();
        let self_norm = self.values.iter().map(|v| v * v).sum::<f64>().sqrt();
        let feature_norm = features.iter().map(|v| v * v).sum::<f64>().sqrt();
        if self_norm <= f64::EPSILON || feature_norm <= f64::EPSILON {
            return 0.0;
        }
        (dot / (self_norm * feature_norm)).clamp(-1.0, 1.0)
    }

    /// Drift toward the features `preferred` showed that `rejected` lacked.
    ///
    /// Each gap (stronger emotion, more sentences, more logical connectors)
    /// contributes its own increment; the valence gap moves warmth.
    /// Returns the adjustments applied.
    pub fn learn_from_comparison(&mut self, preferred: &str, rejected: &str) -> Vec<(Trait, f64)> {
        let better = trait_features(preferred);
        let worse = trait_features(rejected);
        let mut adjustments = Vec::new();

        for axis in [Trait::Expressiveness, Trait::Structure, Trait::Rigor] {
            if better[axis.index()] > worse[axis.index()] {
                adjustments.push((axis, PERSONALITY_STEP));
            }
        }

        let valence_delta = better[Trait::Warmth.index()] - worse[Trait::Warmth.index()];
        if valence_delta.abs() > f64::EPSILON {
            adjustments.push((Trait::Warmth, PERSONALITY_STEP * valence_delta));
        }

        self.adjust(&adjustments);
        adjustments
    }
}

/// Text features aligned with [`Trait`] order.
pub fn trait_features(output: &str) -> [f64; TRAIT_COUNT] {
    let tokens = text::tokenize(output);
    let sentences = text::split_sentences(output);
    let reading = EmotionalReading::from_text(output);
    let questions = output.matches('?').count();
    let sentence_count = sentences.len().max(1);

    [
        reading.valence.abs(),
        (sentences.len() as f64 / 5.0).min(1.0),
        (text::lexicon_hits(&tokens, text::LOGICAL_CONNECTORS) as f64 / 3.0).min(1.0),
        reading.valence,
        (questions as f64 / sentence_count as f64).min(1.0),
        reading.dominance,
    ]
}

// ---------------------------------------------------------------------------
// Emotional reading
// ---------------------------------------------------------------------------

/// Valence in `[-1, 1]`, arousal and dominance in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionalReading {
    pub valence: f64,
    pub arousal: f64,
    pub dominance: f64,
}

impl Default for EmotionalReading {
    fn default() -> Self {
        Self::neutral()
    }
}

impl EmotionalReading {
    pub fn neutral() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.0,
            dominance: 0.5,
        }
    }

    /// Lexicon-based reading.
    pub fn from_text(output: &str) -> Self {
        let tokens = text::tokenize(output);
        let valence = net_sentiment(&tokens);
        let polar = text::lexicon_hits(&tokens, text::POSITIVE_WORDS)
            + text::lexicon_hits(&tokens, text::NEGATIVE_WORDS);
        let intensifiers = text::lexicon_hits(&tokens, text::INTENSIFIERS);
        let exclamations = output.matches('!').count();
        let assertive = text::lexicon_hits(&tokens, text::ASSERTIVE_WORDS);
        let questions = output.matches('?').count();

        Self {
            valence,
            arousal: ((polar + intensifiers + exclamations) as f64 / 5.0).clamp(0.0, 1.0),
            dominance: (0.3 + 0.2 * assertive as f64 - 0.1 * questions as f64).clamp(0.0, 1.0),
        }
    }

    /// Lexicon reading with valence replaced by the classifier's verdict.
    pub fn from_classification(output: &str, classification: &Classification) -> Self {
        Self {
            valence: classification.signed_score(),
            ..Self::from_text(output)
        }
    }

    /// `"positive"`, `"negative"`, or `"neutral"` by valence band.
    pub fn valence_band(&self) -> &'static str {
        if self.valence > 0.3 {
            "positive"
        } else if self.valence < -0.3 {
            "negative"
        } else {
            "neutral"
        }
    }

    pub fn is_aroused(&self) -> bool {
        self.arousal > 0.6
    }

    pub fn is_dominant(&self) -> bool {
        self.dominance > 0.6
    }
}

/// `(positive - negative) / polar` over lexicon hits; zero with no hits.
pub fn net_sentiment(tokens: &[String]) -> f64 {
    let positive = text::lexicon_hits(tokens, text::POSITIVE_WORDS) as f64;
    let negative = text::lexicon_hits(tokens, text::NEGATIVE_WORDS) as f64;
    let polar = positive + negative;
    if polar == 0.0 {
        return 0.0;
    }
    ((positive - negative) / polar).clamp(-1.0, 1.0)
}

/// Emotional tag attached to a response graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalMapping {
    pub label: String,
    pub score: f64,
    pub reading: EmotionalReading,
}

impl EmotionalMapping {
    pub fn neutral() -> Self {
        Self {
            label: "neutral".into(),
            score: 0.0,
            reading: EmotionalReading::neutral(),
        }
    }

    pub fn from_classification(output: &str, classification: &Classification) -> Self {
        Self {
            label: classification.label.clone(),
            score: classification.score.clamp(0.0, 1.0),
            reading: EmotionalReading::from_classification(output, classification),
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Bounded log of readings, newest last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalHistory {
    cap: usize,
    entries: VecDeque<EmotionalReading>,
}

impl EmotionalHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, reading: EmotionalReading) {
        self.entries.push_back(reading);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `count` readings, newest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &EmotionalReading> {
        self.entries.iter().rev().take(count)
    }
}

// ---------------------------------------------------------------------------
// Primary emotions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Joy,
    Sadness,
    Fear,
    Anger,
    Trust,
    Disgust,
    Anticipation,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Fear,
        Emotion::Anger,
        Emotion::Trust,
        Emotion::Disgust,
        Emotion::Anticipation,
        Emotion::Surprise,
    ];
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Joy => "joy",
            Self::Sadness => "sadness",
            Self::Fear => "fear",
            Self::Anger => "anger",
            Self::Trust => "trust",
            Self::Disgust => "disgust",
            Self::Anticipation => "anticipation",
            Self::Surprise => "surprise",
        };
        f.write_str(label)
    }
}

const EMOTION_MAX: f64 = 100.0;
const DEFAULT_DECAY: f64 = 0.9;

/// Dominant emotion plus the derived balances, as reported in status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionSummary {
    pub dominant: Emotion,
    pub dominant_level: f64,
    pub stability: f64,
    pub adaptability: f64,
    pub social_alignment: f64,
}

/// Eight primary emotions on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryEmotions {
    levels: [f64; 8],
}

impl Default for PrimaryEmotions {
    fn default() -> Self {
        Self { levels: [50.0; 8] }
    }
}

impl PrimaryEmotions {
    pub fn level(&self, emotion: Emotion) -> f64 {
        self.levels[emotion as usize]
    }

    /// Shift one emotion by `delta` (clamped to 0–100) and decay every other
    /// emotion by `decay`.
    pub fn update(&mut self, emotion: Emotion, delta: f64, decay: f64) {
        for (index, level) in self.levels.iter_mut().enumerate() {
            if index == emotion as usize {
                *level = (*level + delta).clamp(0.0, EMOTION_MAX);
            } else {
                *level *= decay;
            }
        }
    }

    /// Feed one emotional reading in.
    pub fn absorb_reading(&mut self, reading: &EmotionalReading) {
        if reading.valence > 0.0 {
            self.update(Emotion::Joy, reading.valence * 10.0, DEFAULT_DECAY);
        } else if reading.valence < 0.0 {
            self.update(Emotion::Sadness, -reading.valence * 10.0, DEFAULT_DECAY);
        }
        if reading.is_aroused() {
            self.update(Emotion::Surprise, reading.arousal * 5.0, DEFAULT_DECAY);
        }
        if reading.is_dominant() {
            self.update(Emotion::Trust, reading.dominance * 5.0, DEFAULT_DECAY);
        }
    }

    pub fn stability(&self) -> f64 {
        (self.level(Emotion::Joy) + self.level(Emotion::Trust)
            - self.level(Emotion::Fear)
            - self.level(Emotion::Anger))
            / 2.0
    }

    pub fn adaptability(&self) -> f64 {
        (self.level(Emotion::Anticipation) + self.level(Emotion::Surprise)
            - self.level(Emotion::Sadness))
            / 2.0
    }

    pub fn social_alignment(&self) -> f64 {
        self.level(Emotion::Trust) - self.level(Emotion::Disgust)
    }

    pub fn summary(&self) -> EmotionSummary {
        let (dominant, dominant_level) = self.dominant();
        EmotionSummary {
            dominant,
            dominant_level,
            stability: self.stability(),
            adaptability: self.adaptability(),
            social_alignment: self.social_alignment(),
        }
    }

    /// Highest emotion; the first in declaration order wins ties.
    pub fn dominant(&self) -> (Emotion, f64) {
        Emotion::ALL
            .iter()
            .map(|emotion| (*emotion, self.level(*emotion)))
            .fold((Emotion::Joy, f64::MIN), |best, candidate| {
                if candidate.1 > best.1 { candidate } else { best }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(values: &[f64]) -> f64 {
        values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    #[test]
    fn default_personality_is_unit_length() {
        let personality = PersonalityVector::default();
        assert_eq!(personality.values().len(), TRAIT_COUNT);
        assert!((norm(personality.values()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn adjust_renormalizes_and_stays_in_range() {
        let mut personality = PersonalityVector::default();
        for _ in 0..50 {
            personality.adjust(&[(Trait::Rigor, 0.3), (Trait::Warmth, -0.2)]);
        }
        assert!((norm(personality.values()) - 1.0).abs() < 1e-9);
        assert!(personality.values().iter().all(|v| (-1.0..=1.0).contains(v)));
        assert!(personality.get(Trait::Rigor) > personality.get(Trait::Structure));
    }

    #[test]
    fn comparison_nudges_toward_richer_output() {
        let mut personality = PersonalityVector::default();
        let before = personality.get(Trait::Rigor);
        let applied = personality.learn_from_comparison(
            "I am so happy to help. It works because the cache is warm. Therefore it is fast.",
            "ok",
        );
        let axes: Vec<Trait> = applied.iter().map(|(axis, _)| *axis).collect();
        assert!(axes.contains(&Trait::Expressiveness));
        assert!(axes.contains(&Trait::Structure));
        assert!(axes.contains(&Trait::Rigor));
        assert!(axes.contains(&Trait::Warmth));
        assert!(personality.get(Trait::Rigor) > before);
    }

    #[test]
    fn comparison_with_no_gap_is_noop() {
        let mut personality = PersonalityVector::default();
        let applied = personality.learn_from_comparison("same text.", "same text.");
        assert!(applied.is_empty());
        assert_eq!(personality, PersonalityVector::default());
    }

    #[test]
    fn reading_reflects_lexicon() {
        let happy = EmotionalReading::from_text("This is wonderful, I really love it!");
        assert!(happy.valence > 0.3);
        assert_eq!(happy.valence_band(), "positive");
        assert!(happy.arousal > 0.0);

        let sad = EmotionalReading::from_text("I feel sad and lonely.");
        assert!(sad.valence < -0.3);

        let flat = EmotionalReading::from_text("The table has four legs.");
        assert_eq!(flat.valence, 0.0);
        assert_eq!(flat.valence_band(), "neutral");
    }

    #[test]
    fn history_is_bounded_newest_first() {
        let mut history = EmotionalHistory::new(3);
        for step in 0..5 {
            history.push(EmotionalReading {
                valence: step as f64 / 10.0,
                ..EmotionalReading::neutral()
            });
        }
        assert_eq!(history.len(), 3);
        let recent: Vec<f64> = history.recent(2).map(|r| r.valence).collect();
        assert_eq!(recent, vec![0.4, 0.3]);
    }

    #[test]
    fn primary_update_clamps_and_decays_others() {
        let mut emotions = PrimaryEmotions::default();
        emotions.update(Emotion::Joy, 80.0, 0.9);
        assert_eq!(emotions.level(Emotion::Joy), 100.0);
        assert!((emotions.level(Emotion::Fear) - 45.0).abs() < 1e-9);
        assert_eq!(emotions.dominant().0, Emotion::Joy);
    }

    #[test]
    fn derived_metrics_at_baseline() {
        let emotions = PrimaryEmotions::default();
        assert_eq!(emotions.stability(), 0.0);
        assert_eq!(emotions.adaptability(), 25.0);
        assert_eq!(emotions.social_alignment(), 0.0);
    }

    #[test]
    fn summary_reports_derived_values() {
        let mut emotions = PrimaryEmotions::default();
        emotions.update(Emotion::Trust, 30.0, 1.0);
        let summary = emotions.summary();
        assert_eq!(summary.dominant, Emotion::Trust);
        assert_eq!(summary.dominant_level, 80.0);
        assert_eq!(summary.stability, 15.0);
        assert_eq!(summary.adaptability, 25.0);
        assert_eq!(summary.social_alignment, 30.0);
    }

    #[test]
    fn negative_reading_raises_sadness() {
        let mut emotions = PrimaryEmotions::default();
        emotions.absorb_reading(&EmotionalReading {
            valence: -1.0,
            arousal: 0.0,
            dominance: 0.0,
        });
        assert_eq!(emotions.dominant().0, Emotion::Sadness);
    }
}
