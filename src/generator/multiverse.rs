//! Multi-layer candidate simulation over the response graphs.
//!
//! Each layer walks a shrinking number of the most activated matching graphs.
//! Layers that produce fewer than three walks are topped up from recent
//! emotional readings, then from generic topic templates.

use super::{Candidate, CandidateSource};
use crate::affect::{EmotionalHistory, EmotionalReading};
use crate::config::EngineConfig;
use crate::error::GenerationError;
use crate::knowledge::GraphStore;
use crate::quantum::QuantumState;
use crate::random::RandomSource;
use crate::text;

/// Most graphs walked in a single layer.
const MAX_GRAPHS_PER_LAYER: usize = 5;

/// Minimum candidates per layer before templates are used.
const MIN_LAYER_CANDIDATES: usize = 3;

const BASE_PROBABILITY: f64 = 0.5;
const LAYER_DECAY: f64 = 0.1;
const IDEAL_WORDS: f64 = 15.0;
const WORD_SPREAD: f64 = 10.0;

/// Placeholder used when the input has no tokens.
const FALLBACK_TOPIC: &str = "that";

const TOPIC_TEMPLATES: &[&str] = &[
    "Tell me more about {topic}.",
    "What do you think about {topic}?",
    "{topic} is an interesting subject to explore.",
    "There is a lot to say about {topic}.",
    "Let us look at {topic} from another angle.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationParams {
    pub layers: usize,
    pub walk_steps: usize,
}

impl From<&EngineConfig> for SimulationParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            layers: config.simulation_layers,
            walk_steps: config.walk_steps,
        }
    }
}

/// Run every layer and return the candidates with probabilities assigned.
/// Resonance and compliance are left for the caller to score.
pub fn simulate(
    store: &mut GraphStore,
    quantum: &QuantumState,
    history: &EmotionalHistory,
    input: &str,
    params: SimulationParams,
    rng: &mut dyn RandomSource,
) -> Result<Vec<Candidate>, GenerationError> {
    let query = text::token_set(input);
    let input_tokens = text::tokenize(input);
    let matching = store.matching(&query);
    let mean_entanglement = quantum.mean_entanglement();

    let mut candidates = Vec::new();
    for layer in 0..params.layers {
        let mut layer_candidates = Vec::new();

        let take = graphs_for_layer(matching.len(), layer);
        for (index, graph_id) in matching.iter().take(take).enumerate() {
            let Some(graph) = store.get(*graph_id) else {
                continue;
            };
            let words = graph.walk(&query, params.walk_steps, rng);
            store.activate(*graph_id);
            if words.is_empty() {
                continue;
            }
            layer_candidates.push(Candidate::new(
                layer,
                CandidateSource::Graph(*graph_id),
                index,
                words.join(" "),
            ));
        }

        let missing = MIN_LAYER_CANDIDATES.saturating_sub(layer_candidates.len());
        for (index, reading) in history.recent(missing).enumerate() {
            let topic = pick_topic(&input_tokens, rng);
            layer_candidates.push(Candidate::new(
                layer,
                CandidateSource::Emotional,
                index,
                emotional_template(reading, topic),
            ));
        }

        let mut index = 0;
        while layer_candidates.len() < MIN_LAYER_CANDIDATES {
            let topic = pick_topic(&input_tokens, rng);
            let template = TOPIC_TEMPLATES[rng.pick(TOPIC_TEMPLATES.len())];
            layer_candidates.push(Candidate::new(
                layer,
                CandidateSource::Template,
                index,
                template.replace("{topic}", topic),
            ));
            index += 1;
        }

        for candidate in &mut layer_candidates {
            candidate.probability = probability(&candidate.text, layer, mean_entanglement);
        }
        candidates.extend(layer_candidates);
    }

    if candidates.is_empty() {
        return Err(GenerationError::NoCandidates);
    }
    Ok(candidates)
}

/// `max(1, min(5, matching - layer))`, or zero when nothing matches.
pub fn graphs_for_layer(matching: usize, layer: usize) -> usize {
    if matching == 0 {
        return 0;
    }
    matching
        .saturating_sub(layer)
        .min(MAX_GRAPHS_PER_LAYER)
        .max(1)
}

/// Base probability scaled by layer depth, a Gaussian preference for
/// ~15-word texts, and the entanglement factor.
pub fn probability(candidate: &str, layer: usize, mean_entanglement: f64) -> f64 {
    let tokens = text::tokenize(candidate);
    let words = tokens.len() as f64;
    let layer_factor = 1.0 / (1.0 + LAYER_DECAY * layer as f64);
    let length_factor = (-(words - IDEAL_WORDS).powi(2) / (2.0 * WORD_SPREAD.powi(2))).exp();
    let entanglement_factor = 0.5 + 0.5 * mean_entanglement * text::lexical_complexity(&tokens);
    (BASE_PROBABILITY * layer_factor * length_factor * entanglement_factor).clamp(0.0, 1.0)
}

fn pick_topic<'a>(tokens: &'a [String], rng: &mut dyn RandomSource) -> &'a str {
    if tokens.is_empty() {
        return FALLBACK_TOPIC;
    }
    &tokens[rng.pick(tokens.len())]
}

fn emotional_template(reading: &EmotionalReading, topic: &str) -> String {
    let opening = match reading.valence_band() {
        "positive" => format!("I feel good about {topic}."),
        "negative" => format!("{topic} sounds hard to deal with."),
        _ => format!("Let us think calmly about {topic}."),
    };
    let closing = match (reading.is_aroused(), reading.is_dominant()) {
        (true, true) => " We should act on it right away!",
        (true, false) => " This feels exciting!",
        (false, true) => " I am confident we can work through it.",
        (false, false) => " We can take it one step at a time.",
    };
    format!("{opening}{closing}")
}
