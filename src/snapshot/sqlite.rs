//! SqliteSnapshotStore: snapshot persistence in a dedicated SQLite file.

use super::{Snapshot, SnapshotStore};
use crate::error::PersistenceError;

use futures::future::BoxFuture;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Row key used when the caller does not name the engine.
pub const DEFAULT_KEY: &str = "default";

/// One row per engine key, overwritten on every save.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
    key: String,
}

impl SqliteSnapshotStore {
    /// Connect to (or create) the snapshot database at `path`.
    pub async fn connect(path: &Path) -> Result<Arc<Self>, PersistenceError> {
        Self::connect_with_key(path, DEFAULT_KEY).await
    }

    /// Like [`Self::connect`], storing under `key` so several engines can
    /// share one file.
    pub async fn connect_with_key(
        path: &Path,
        key: impl Into<String>,
    ) -> Result<Arc<Self>, PersistenceError> {
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Arc::new(Self {
            pool,
            key: key.into(),
        }))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let payload = snapshot.to_json()?;
        sqlx::query(
            "INSERT INTO engine_snapshots (key, payload, phase, iterations, saved_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, phase = excluded.phase,
                 iterations = excluded.iterations, saved_at = excluded.saved_at",
        )
        .bind(&self.key)
        .bind(&payload)
        .bind(snapshot.phase.to_string())
        .bind(snapshot.iterations as i64)
        .bind(snapshot.saved_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        tracing::debug!(
            key = %self.key,
            phase = %snapshot.phase,
            iterations = snapshot.iterations,
            bytes = payload.len(),
            "snapshot written"
        );
        Ok(())
    }

    async fn read(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT payload FROM engine_snapshots WHERE key = ?")
                .bind(&self.key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(payload,)| Snapshot::from_json(&payload))
            .transpose()
    }

    async fn delete(&self) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM engine_snapshots WHERE key = ?")
            .bind(&self.key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save<'a>(&'a self, snapshot: &'a Snapshot) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(self.write(snapshot))
    }

    fn load<'a>(&'a self) -> BoxFuture<'a, Result<Option<Snapshot>, PersistenceError>> {
        Box::pin(self.read())
    }

    fn clear<'a>(&'a self) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(self.delete())
    }
}

impl std::fmt::Debug for SqliteSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSnapshotStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Embedded schema. `IF NOT EXISTS` keeps reconnects safe.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS engine_snapshots (
    key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    phase TEXT NOT NULL,
    iterations INTEGER NOT NULL,
    saved_at TEXT NOT NULL
);
"#;
