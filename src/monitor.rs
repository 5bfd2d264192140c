//! Rolling observations over emitted outputs and incoming inputs.

use serde::{Deserialize, Serialize};

use std::collections::{HashSet, VecDeque};

/// Default window for both trackers.
pub const WINDOW: usize = 100;

/// Distinct/window ratio below which input diversity is considered low.
const LOW_DIVERSITY_RATIO: f64 = 0.6;

/// Bounded window of overall scores for emitted outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceHistory {
    window: usize,
    scores: VecDeque<f64>,
}

impl Default for PerformanceHistory {
    fn default() -> Self {
        Self::new(WINDOW)
    }
}

impl PerformanceHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            scores: VecDeque::new(),
        }
    }

    pub fn record(&mut self, score: f64) {
        self.scores.push_back(score);
        while self.scores.len() > self.window {
            self.scores.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Mean of first differences; zero with fewer than two points.
    pub fn trend(&self) -> f64 {
        if self.scores.len() < 2 {
            return 0.0;
        }
        let steps = self.scores.len() - 1;
        let rise: f64 = self
            .scores
            .iter()
            .zip(self.scores.iter().skip(1))
            .map(|(before, after)| after - before)
            .sum();
        rise / steps as f64
    }
}

/// Bounded window of normalized inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDiversity {
    window: usize,
    inputs: VecDeque<String>,
    warned: bool,
}

impl Default for InputDiversity {
    fn default() -> Self {
        Self::new(WINDOW)
    }
}

impl InputDiversity {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            inputs: VecDeque::new(),
            warned: false,
        }
    }

    /// Record an input. Returns true exactly once per low-diversity episode,
    /// on the call that enters it.
    pub fn record(&mut self, input: &str) -> bool {
        self.inputs.push_back(normalize(input));
        while self.inputs.len() > self.window {
            self.inputs.pop_front();
        }

        let low = self.is_low();
        let entered = low && !self.warned;
        self.warned = low;
        entered
    }

    /// Whether `input` (normalized) is already in the window.
    pub fn has_seen(&self, input: &str) -> bool {
        let normalized = normalize(input);
        self.inputs.iter().any(|seen| *seen == normalized)
    }

    pub fn ratio(&self) -> f64 {
        if self.inputs.is_empty() {
            return 1.0;
        }
        let distinct: HashSet<&str> = self.inputs.iter().map(String::as_str).collect();
        distinct.len() as f64 / self.inputs.len() as f64
    }

    pub fn is_low(&self) -> bool {
        self.inputs.len() >= self.window && self.ratio() < LOW_DIVERSITY_RATIO
    }
}

fn normalize(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
