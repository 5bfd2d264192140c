//! Durable engine snapshots.
//!
//! A [`Snapshot`] is the engine's full persistent state. Stores are
//! best-effort: the engine logs their failures and carries on in memory.

pub mod sqlite;

pub use sqlite::SqliteSnapshotStore;

use crate::affect::{EmotionalHistory, PersonalityVector, PrimaryEmotions};
use crate::error::PersistenceError;
use crate::health::HealthMonitor;
use crate::incentive::IncentiveSystem;
use crate::knowledge::KnowledgeBase;
use crate::metrics::Metrics;
use crate::monitor::{InputDiversity, PerformanceHistory};
use crate::phase::Phase;
use crate::quantum::QuantumState;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Bumped whenever the snapshot layout changes incompatibly.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Persistent engine state. Simulation candidates are transient and never
/// included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    pub phase: Phase,
    pub verification_counter: u32,
    pub iterations: u64,
    pub metrics: Metrics,
    pub knowledge: KnowledgeBase,
    pub quantum: Option<QuantumState>,
    pub scaffold_active: bool,
    pub personality: PersonalityVector,
    pub emotional_history: EmotionalHistory,
    pub primary_emotions: PrimaryEmotions,
    pub performance: PerformanceHistory,
    pub input_diversity: InputDiversity,
    #[serde(default)]
    pub incentives: IncentiveSystem,
    #[serde(default)]
    pub health: HealthMonitor,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a snapshot, rejecting unknown format versions.
    pub fn from_json(payload: &str) -> Result<Self, PersistenceError> {
        let snapshot: Self = serde_json::from_str(payload)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistenceError::Other(anyhow::anyhow!(
                "unsupported snapshot format version {}",
                snapshot.format_version
            )));
        }
        Ok(snapshot)
    }
}

/// Where snapshots are kept.
pub trait SnapshotStore: Send + Sync {
    fn save<'a>(&'a self, snapshot: &'a Snapshot) -> BoxFuture<'a, Result<(), PersistenceError>>;

    fn load<'a>(&'a self) -> BoxFuture<'a, Result<Option<Snapshot>, PersistenceError>>;

    fn clear<'a>(&'a self) -> BoxFuture<'a, Result<(), PersistenceError>>;
}

/// Keeps the serialized snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    payload: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.payload.lock().await.is_none()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save<'a>(&'a self, snapshot: &'a Snapshot) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async move {
            let payload = snapshot.to_json()?;
            *self.payload.lock().await = Some(payload);
            Ok(())
        })
    }

    fn load<'a>(&'a self) -> BoxFuture<'a, Result<Option<Snapshot>, PersistenceError>> {
        Box::pin(async move {
            let payload = self.payload.lock().await.clone();
            payload.as_deref().map(Snapshot::from_json).transpose()
        })
    }

    fn clear<'a>(&'a self) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async move {
            *self.payload.lock().await = None;
            Ok(())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::EngineConfig;

    pub(crate) fn sample_snapshot() -> Snapshot {
        let config = EngineConfig::default();
        Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            phase: Phase::SelfEmulation,
            verification_counter: 0,
            iterations: 42,
            metrics: Metrics::default(),
            knowledge: KnowledgeBase::new(&config),
            quantum: Some(QuantumState::new(config.entanglement_dims, 10)),
            scaffold_active: true,
            personality: PersonalityVector::default(),
            emotional_history: EmotionalHistory::new(5),
            primary_emotions: PrimaryEmotions::default(),
            performance: PerformanceHistory::default(),
            input_diversity: InputDiversity::default(),
            incentives: IncentiveSystem::default(),
            health: HealthMonitor::default(),
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(&sample_snapshot()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.phase, Phase::SelfEmulation);
        assert_eq!(loaded.iterations, 42);

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[test]
    fn snapshot_without_incentives_or_health_still_loads() {
        let mut value = serde_json::to_value(sample_snapshot()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("incentives");
        object.remove("health");
        let loaded = Snapshot::from_json(&value.to_string()).unwrap();
        assert_eq!(loaded.incentives, IncentiveSystem::default());
        assert_eq!(loaded.health, HealthMonitor::default());
    }

    #[test]
    fn unknown_format_version_is_rejected() {
        let mut snapshot = sample_snapshot();
        snapshot.format_version = 99;
        let payload = snapshot.to_json().unwrap();
        assert!(Snapshot::from_json(&payload).is_err());
    }
}
