//! Deterministic selection from a simulated candidate set.

use crate::generator::Candidate;

use std::cmp::Ordering;

/// Result of collapsing a candidate set.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Index into the slice passed to [`collapse`].
    pub index: usize,
    pub weight: f64,
    /// True when no candidate was truth-compliant and the full set was used.
    pub degraded: bool,
}

/// Pick the candidate with the highest `probability × (0.5 + resonance / 2)`.
///
/// Candidates failing truth compliance are excluded unless every candidate
/// fails, in which case the full set is used and the condition is logged.
/// Probabilities are renormalized over the surviving set (uniformly when they
/// sum to zero). Ties keep the earlier candidate. Returns `None` only for an
/// empty slice.
pub fn collapse(candidates: &[Candidate]) -> Option<Selection> {
    if candidates.is_empty() {
        return None;
    }

    let mut surviving: Vec<usize> = (0..candidates.len())
        .filter(|index| candidates[*index].truth_compliance)
        .collect();
    let degraded = surviving.is_empty();
    if degraded {
        tracing::warn!(
            candidates = candidates.len(),
            "no truth-compliant candidates, collapsing over full set"
        );
        surviving = (0..candidates.len()).collect();
    }

    let total: f64 = surviving
        .iter()
        .map(|index| candidates[*index].probability.max(0.0))
        .sum();
    let uniform = 1.0 / surviving.len() as f64;

    let mut weighted: Vec<(usize, f64)> = surviving
        .into_iter()
        .map(|index| {
            let candidate = &candidates[index];
            let normalized = if total > 0.0 {
                candidate.probability.max(0.0) / total
            } else {
                uniform
            };
            let resonance = candidate.emotional_resonance.clamp(0.0, 1.0);
            (index, normalized * (0.5 + resonance / 2.0))
        })
        .collect();
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    weighted.first().map(|(index, weight)| Selection {
        index: *index,
        weight: *weight,
        degraded,
    })
}
