//! Optional embedding and classification providers.
//!
//! Both are external and asynchronous. Absence and failure are explicit
//! [`ProviderOutcome`] variants that each call site handles by falling back to
//! a heuristic; neither ever fails the surrounding evaluation.

use crate::error::ProviderError;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Label and confidence returned by a sentiment classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub score: f64,
}

impl Classification {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    /// Score signed by polarity: positive labels map to `+score`, negative to
    /// `-score`, anything else to zero.
    pub fn signed_score(&self) -> f64 {
        let score = self.score.clamp(0.0, 1.0);
        match self.label.to_ascii_lowercase().as_str() {
            "positive" | "pos" | "joy" | "love" => score,
            "negative" | "neg" | "sadness" | "anger" | "fear" => -score,
            _ => 0.0,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.signed_score() == 0.0
    }
}

/// Produces a dense vector for a text.
pub trait EmbeddingProvider: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, ProviderError>>;
}

/// Labels a text with a sentiment/emotion class.
pub trait Classifier: Send + Sync {
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Classification, ProviderError>>;
}

/// Result of consulting an optional provider.
#[derive(Debug)]
pub enum ProviderOutcome<T> {
    Available(T),
    /// No provider configured.
    Unavailable,
    /// Provider configured but the call failed.
    Failed(ProviderError),
}

/// Availability and fallback counts, reported through engine status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub embedding_available: bool,
    pub classifier_available: bool,
    pub embedding_fallbacks: u64,
    pub classifier_fallbacks: u64,
}

/// Bundle of optional providers injected into the engine.
#[derive(Clone, Default)]
pub struct Providers {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    classifier: Option<Arc<dyn Classifier>>,
    embedding_fallbacks: Arc<AtomicU64>,
    classifier_fallbacks: Arc<AtomicU64>,
}

impl Providers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub async fn embed(&self, text: &str) -> ProviderOutcome<Vec<f32>> {
        let Some(embedder) = &self.embedder else {
            self.embedding_fallbacks.fetch_add(1, Ordering::Relaxed);
            return ProviderOutcome::Unavailable;
        };
        match embedder.embed(text).await {
            Ok(vector) => ProviderOutcome::Available(vector),
            Err(error) => {
                self.embedding_fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%error, "embedding provider failed, using token overlap");
                ProviderOutcome::Failed(error)
            }
        }
    }

    pub async fn classify(&self, text: &str) -> ProviderOutcome<Classification> {
        let Some(classifier) = &self.classifier else {
            self.classifier_fallbacks.fetch_add(1, Ordering::Relaxed);
            return ProviderOutcome::Unavailable;
        };
        match classifier.classify(text).await {
            Ok(classification) => ProviderOutcome::Available(classification),
            Err(error) => {
                self.classifier_fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%error, "classifier failed, using sentiment lexicon");
                ProviderOutcome::Failed(error)
            }
        }
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus {
            embedding_available: self.embedder.is_some(),
            classifier_available: self.classifier.is_some(),
            embedding_fallbacks: self.embedding_fallbacks.load(Ordering::Relaxed),
            classifier_fallbacks: self.classifier_fallbacks.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
