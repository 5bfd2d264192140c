//! Internal knowledge the engine grows from observed exchanges.

pub mod exemplar;
pub mod graph;

pub use exemplar::{ExemplarLog, KnowledgeUnit};
pub use graph::{GraphStore, ResponseGraph};

use crate::affect::EmotionalMapping;
use crate::config::{EngineConfig, KnowledgeVariant};
use crate::metrics::Metrics;

use serde::{Deserialize, Serialize};

/// One exchange to absorb, with everything either store might need.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    pub input: &'a str,
    pub output: &'a str,
    pub metrics: Metrics,
    pub emotion: EmotionalMapping,
}

/// Knowledge store for the configured variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum KnowledgeBase {
    Basic(ExemplarLog),
    Graph(GraphStore),
}

impl KnowledgeBase {
    pub fn new(config: &EngineConfig) -> Self {
        match config.variant {
            KnowledgeVariant::Basic => Self::Basic(ExemplarLog::new(config.exemplar_capacity)),
            KnowledgeVariant::Graph => Self::Graph(GraphStore::new(config.graph_capacity)),
        }
    }

    pub fn variant(&self) -> KnowledgeVariant {
        match self {
            Self::Basic(_) => KnowledgeVariant::Basic,
            Self::Graph(_) => KnowledgeVariant::Graph,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Basic(log) => log.len(),
            Self::Graph(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow the store from one exchange, enforcing the cap. Returns the number
    /// of entries evicted.
    pub fn absorb(&mut self, observation: Observation<'_>) -> usize {
        let evicted = match self {
            Self::Basic(log) => log.push(KnowledgeUnit::new(
                observation.input,
                observation.output,
                observation.metrics,
            )),
            Self::Graph(store) => {
                store.absorb(observation.input, observation.output, observation.emotion)
            }
        };
        if evicted > 0 {
            tracing::debug!(evicted, size = self.len(), "knowledge store at capacity");
        }
        evicted
    }
}
