//! Fledgling: a response engine that starts out leaning on an external
//! scaffold generator and grows its own word-graph generator until it can
//! retire the scaffold.
//!
//! The lifecycle is Initialization → Scaffolding → SelfEmulation →
//! Verification → Independent. See [`Engine`] for the public surface.

pub mod affect;
pub mod collapse;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod health;
pub mod incentive;
pub mod knowledge;
pub mod metrics;
pub mod monitor;
pub mod phase;
pub mod providers;
pub mod quantum;
pub mod random;
pub mod scaffold;
pub mod snapshot;
pub mod telemetry;
pub mod text;
pub mod truth;

pub use config::{EngineConfig, KnowledgeVariant, ScaffoldConfig};
pub use engine::{Engine, EngineStatus};
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsEvaluator};
pub use phase::Phase;
pub use providers::{Classification, Classifier, EmbeddingProvider, Providers};
pub use scaffold::{ScaffoldAdapter, ScaffoldHandle};
pub use snapshot::{MemorySnapshotStore, Snapshot, SnapshotStore, SqliteSnapshotStore};
