//! Top-level error types for the engine.

use crate::phase::Phase;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Engine errors surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scaffold or a required dependency could not be brought up.
    #[error("initialization failed: {0}")]
    Initialization(#[source] ScaffoldError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A phase's generation path failed and no scaffold was left to fall back on.
    #[error("processing failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// The state machine reached a state it has no handling for.
    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("engine has not been initialized")]
    NotInitialized,
}

/// Failures from the external scaffold generator.
#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    #[error("scaffold unavailable: {0}")]
    Unavailable(String),

    #[error("scaffold has been released")]
    Released,

    #[error("scaffold generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures from optional embedding/classification providers.
///
/// These never escape the metrics evaluator; they are counted and replaced by
/// the heuristic fallback.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("embedding provider failed: {0}")]
    Embedding(String),

    #[error("classifier failed: {0}")]
    Classification(String),
}

/// Failures from the internal candidate generator.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("knowledge store is empty")]
    EmptyKnowledge,

    #[error("no candidates produced for input")]
    NoCandidates,
}

/// Anything that can go wrong inside a phase step.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("internal generation failed in {phase} phase: {source}")]
    Generation {
        phase: Phase,
        #[source]
        source: GenerationError,
    },

    #[error(transparent)]
    Scaffold(#[from] ScaffoldError),
}

/// Snapshot save/load failures. Logged by the engine, never propagated from
/// `process`.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("snapshot database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
