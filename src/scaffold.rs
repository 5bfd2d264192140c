//! Scaffold adapter contract and lifecycle slot.
//!
//! The scaffold is the external generator the engine leans on until its own
//! knowledge is sufficient. [`ScaffoldSlot`] owns the live handle and makes
//! release idempotent: once released, `generate` is refused and further
//! releases are no-ops.

use crate::config::ScaffoldConfig;
use crate::error::ScaffoldError;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use std::sync::Arc;

/// Opaque handle returned by [`ScaffoldAdapter::initialize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldHandle {
    pub id: String,
}

impl ScaffoldHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// External text generator.
///
/// Implementations must be Send + Sync; calls are awaited in place and never
/// overlap for a single engine.
pub trait ScaffoldAdapter: Send + Sync {
    fn initialize<'a>(
        &'a self,
        config: &'a ScaffoldConfig,
    ) -> BoxFuture<'a, Result<ScaffoldHandle, ScaffoldError>>;

    fn generate<'a>(
        &'a self,
        handle: &'a ScaffoldHandle,
        prompt: &'a str,
        temperature: f64,
        max_tokens: u32,
    ) -> BoxFuture<'a, Result<String, ScaffoldError>>;

    fn release<'a>(&'a self, handle: ScaffoldHandle) -> BoxFuture<'a, ()>;
}

/// Holds the adapter and at most one live handle.
pub struct ScaffoldSlot {
    adapter: Arc<dyn ScaffoldAdapter>,
    config: ScaffoldConfig,
    handle: Option<ScaffoldHandle>,
}

impl ScaffoldSlot {
    pub fn new(adapter: Arc<dyn ScaffoldAdapter>, config: ScaffoldConfig) -> Self {
        Self {
            adapter,
            config,
            handle: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Initialize the adapter unless a handle is already live.
    pub async fn ensure_ready(&mut self) -> Result<(), ScaffoldError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = self.adapter.initialize(&self.config).await?;
        tracing::debug!(handle = %handle.id, model = %self.config.model, "scaffold initialized");
        self.handle = Some(handle);
        Ok(())
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, ScaffoldError> {
        let handle = self.handle.as_ref().ok_or(ScaffoldError::Released)?;
        self.adapter
            .generate(
                handle,
                prompt,
                self.config.temperature,
                self.config.max_tokens,
            )
            .await
    }

    /// Release the live handle. Returns false when there was nothing to
    /// release.
    pub async fn release(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        let id = handle.id.clone();
        self.adapter.release(handle).await;
        tracing::info!(handle = %id, "scaffold released");
        true
    }
}

impl std::fmt::Debug for ScaffoldSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaffoldSlot")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
