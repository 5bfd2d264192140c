//! Engine configuration.

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Which internal knowledge representation the engine grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeVariant {
    /// Flat log of (input, output) exemplars with FIFO eviction.
    Basic,
    /// Weighted word-graphs with entanglement tracking and multi-layer
    /// candidate simulation.
    Graph,
}

impl std::fmt::Display for KnowledgeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Graph => write!(f, "graph"),
        }
    }
}

/// Parameters handed to the scaffold adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ScaffoldConfig {
    /// Opaque model identifier passed through to the adapter.
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            model: "scaffold".into(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

/// Configuration for the bootstrapping engine.
///
/// Loaded from TOML via [`EngineConfig::from_toml_str`]. Every field has a
/// default, so an empty document is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    pub variant: KnowledgeVariant,
    /// Iteration count at which any non-terminal phase is forced to Independent.
    pub max_iterations: u64,
    /// Persist a snapshot every this many `process` calls.
    pub snapshot_interval: u64,
    /// Knowledge size that promotes Scaffolding → SelfEmulation.
    pub self_emulation_threshold: usize,
    /// Knowledge size required (with parity) for SelfEmulation → Verification.
    pub verification_knowledge_threshold: usize,
    /// Internal/scaffold score ratio that must be exceeded for Verification.
    pub emulation_parity_ratio: f64,
    /// Overall score an internal output needs to count toward verification.
    pub verification_quality_threshold: f64,
    /// Consecutive passing outputs required to reach Independent.
    pub verification_required: u32,
    /// Upper bound on the internal share when blending during SelfEmulation.
    pub blend_cap: f64,
    pub exemplar_capacity: usize,
    pub graph_capacity: usize,
    pub simulation_layers: usize,
    pub walk_steps: usize,
    pub entanglement_dims: usize,
    pub collapse_history_cap: usize,
    pub emotional_history_cap: usize,
    /// Fixed RNG seed. `None` seeds from OS entropy.
    pub rng_seed: Option<u64>,
    pub scaffold: ScaffoldConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variant: KnowledgeVariant::Graph,
            max_iterations: 1000,
            snapshot_interval: 10,
            self_emulation_threshold: 50,
            verification_knowledge_threshold: 200,
            emulation_parity_ratio: 0.8,
            verification_quality_threshold: 0.6,
            verification_required: 10,
            blend_cap: 0.8,
            exemplar_capacity: 1000,
            graph_capacity: 1000,
            simulation_layers: 11,
            walk_steps: 20,
            entanglement_dims: 32,
            collapse_history_cap: 100,
            emotional_history_cap: 50,
            rng_seed: None,
            scaffold: ScaffoldConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|error| Error::Config(format!("failed to parse config: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("max_iterations", self.max_iterations as usize),
            ("snapshot_interval", self.snapshot_interval as usize),
            ("exemplar_capacity", self.exemplar_capacity),
            ("graph_capacity", self.graph_capacity),
            ("simulation_layers", self.simulation_layers),
            ("walk_steps", self.walk_steps),
            ("entanglement_dims", self.entanglement_dims),
            ("collapse_history_cap", self.collapse_history_cap),
            ("emotional_history_cap", self.emotional_history_cap),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        let unit = [
            ("emulation_parity_ratio", self.emulation_parity_ratio),
            ("verification_quality_threshold", self.verification_quality_threshold),
            ("blend_cap", self.blend_cap),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{name} must be within [0, 1], got {value}")));
            }
        }

        if self.verification_knowledge_threshold < self.self_emulation_threshold {
            return Err(Error::Config(
                "verification_knowledge_threshold must not be below self_emulation_threshold".into(),
            ));
        }

        Ok(())
    }
}
