//! Entanglement bookkeeping for the graph variant.
//!
//! Despite the naming this is plain co-occurrence tracking: a symmetric
//! matrix bumped by hashed token pairs, a moving-average vector of per-token
//! hash influence, and a bounded log of collapsed candidate ids.

use serde::{Deserialize, Serialize};

use std::collections::VecDeque;

/// Amount added to a matrix cell per co-occurring token pair.
const ENTANGLEMENT_STEP: f64 = 0.05;

/// Smoothing factor for the superposition moving average.
const SUPERPOSITION_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumState {
    dims: usize,
    entanglement: Vec<Vec<f64>>,
    superposition: Vec<f64>,
    collapse_cap: usize,
    collapse_history: VecDeque<String>,
}

/// Compact view reported through engine status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntanglementSummary {
    pub dims: usize,
    pub mean_entanglement: f64,
    pub max_entanglement: f64,
    pub mean_superposition: f64,
    pub collapses: usize,
    pub last_collapse: Option<String>,
}

impl QuantumState {
    pub fn new(dims: usize, collapse_cap: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            entanglement: vec![vec![0.0; dims]; dims],
            superposition: vec![0.0; dims],
            collapse_cap: collapse_cap.max(1),
            collapse_history: VecDeque::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn entanglement(&self, i: usize, j: usize) -> f64 {
        self.entanglement
            .get(i)
            .and_then(|row| row.get(j))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn superposition(&self) -> &[f64] {
        &self.superposition
    }

    /// Fold one token sequence into the matrix and vector. Only the first
    /// `dims` tokens contribute pairs.
    pub fn update(&mut self, tokens: &[String]) {
        let window = &tokens[..tokens.len().min(self.dims)];
        for (a, left) in window.iter().enumerate() {
            for right in &window[a + 1..] {
                let i = self.bucket(left);
                let j = self.bucket(right);
                let value = (self.entanglement[i][j] + ENTANGLEMENT_STEP).min(1.0);
                self.entanglement[i][j] = value;
                self.entanglement[j][i] = value;
            }
        }

        for token in tokens {
            let hash = fnv1a(token);
            let slot = (hash % self.dims as u64) as usize;
            let influence = (hash % 1000) as f64 / 999.0;
            let current = self.superposition[slot];
            self.superposition[slot] =
                ((1.0 - SUPERPOSITION_ALPHA) * current + SUPERPOSITION_ALPHA * influence)
                    .clamp(0.0, 1.0);
        }
    }

    pub fn mean_entanglement(&self) -> f64 {
        let cells = (self.dims * self.dims) as f64;
        self.entanglement.iter().flatten().sum::<f64>() / cells
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.dims).all(|i| {
            (0..self.dims).all(|j| self.entanglement[i][j] == self.entanglement[j][i])
        })
    }

    pub fn record_collapse(&mut self, candidate_id: impl Into<String>) {
        self.collapse_history.push_back(candidate_id.into());
        while self.collapse_history.len() > self.collapse_cap {
            self.collapse_history.pop_front();
        }
    }

    /// Oldest first.
    pub fn collapse_history(&self) -> impl Iterator<Item = &str> {
        self.collapse_history.iter().map(String::as_str)
    }

    pub fn summary(&self) -> EntanglementSummary {
        EntanglementSummary {
            dims: self.dims,
            mean_entanglement: self.mean_entanglement(),
            max_entanglement: self
                .entanglement
                .iter()
                .flatten()
                .copied()
                .fold(0.0, f64::max),
            mean_superposition: self.superposition.iter().sum::<f64>() / self.dims as f64,
            collapses: self.collapse_history.len(),
            last_collapse: self.collapse_history.back().cloned(),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        (fnv1a(token) % self.dims as u64) as usize
    }
}

/// 64-bit FNV-1a. Stable across runs and platforms, unlike `DefaultHasher`.
fn fnv1a(token: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    token.bytes().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}
