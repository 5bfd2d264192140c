//! Internal candidate generation.
//!
//! The basic variant answers from the exemplar log directly. The graph
//! variant runs a multi-layer simulation over the response graphs and hands a
//! ranked candidate set to [`crate::collapse`].

pub mod exemplar;
pub mod multiverse;

pub use exemplar::generate_from_exemplars;
pub use multiverse::{SimulationParams, simulate};

use serde::{Deserialize, Serialize};

/// Where a candidate's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "graph_id")]
pub enum CandidateSource {
    /// Random walk over the response graph with this id.
    Graph(u64),
    /// Template driven by a recent emotional reading.
    Emotional,
    /// Generic topic template.
    Template,
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graph(id) => write!(f, "graph{id}"),
            Self::Emotional => write!(f, "emotion"),
            Self::Template => write!(f, "template"),
        }
    }
}

/// One simulated response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// `layer{n}:{source}:{index}`, unique within one simulation.
    pub id: String,
    pub text: String,
    pub layer: usize,
    pub source: CandidateSource,
    pub probability: f64,
    /// Filled in by the engine after generation.
    pub emotional_resonance: f64,
    /// Filled in by the engine after generation.
    pub truth_compliance: bool,
}

impl Candidate {
    pub fn new(layer: usize, source: CandidateSource, index: usize, text: String) -> Self {
        Self {
            id: format!("layer{layer}:{source}:{index}"),
            text,
            layer,
            source,
            probability: 0.0,
            emotional_resonance: 0.0,
            truth_compliance: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_ids_name_layer_and_source() {
        let candidate = Candidate::new(3, CandidateSource::Graph(17), 1, "hi".into());
        assert_eq!(candidate.id, "layer3:graph17:1");
        let templated = Candidate::new(0, CandidateSource::Template, 2, "hi".into());
        assert_eq!(templated.id, "layer0:template:2");
    }
}
