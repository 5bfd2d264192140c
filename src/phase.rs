//! Lifecycle state machine.
//!
//! Phases only move forward: Initialization → Scaffolding → SelfEmulation →
//! Verification → Independent. The controller evaluates guards, records a
//! bounded transition history, and owns the verification counter. It does
//! not touch the scaffold; the engine releases it when
//! [`Transition::to`] is [`Phase::Independent`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum entries retained in the transition history.
const HISTORY_CAP: usize = 20;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialization,
    Scaffolding,
    SelfEmulation,
    Verification,
    Independent,
}

impl Phase {
    /// Next phase in sequence. Independent is its own successor.
    pub fn next(self) -> Self {
        match self {
            Self::Initialization => Self::Scaffolding,
            Self::Scaffolding => Self::SelfEmulation,
            Self::SelfEmulation => Self::Verification,
            Self::Verification | Self::Independent => Self::Independent,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Independent
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Initialization => "initialization",
            Self::Scaffolding => "scaffolding",
            Self::SelfEmulation => "self_emulation",
            Self::Verification => "verification",
            Self::Independent => "independent",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    ScaffoldReady,
    KnowledgeThreshold,
    EmulationParity,
    VerificationComplete,
    IterationLimit,
    Forced,
    Restored,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::ScaffoldReady => "scaffold_ready",
            Self::KnowledgeThreshold => "knowledge_threshold",
            Self::EmulationParity => "emulation_parity",
            Self::VerificationComplete => "verification_complete",
            Self::IterationLimit => "iteration_limit",
            Self::Forced => "forced",
            Self::Restored => "restored",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub reason: TransitionReason,
    pub iteration: u64,
    pub at: DateTime<Utc>,
}

/// Guard thresholds, copied out of the engine config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub self_emulation_knowledge: usize,
    pub verification_knowledge: usize,
    pub parity_ratio: f64,
    pub verification_required: u32,
    pub max_iterations: u64,
}

impl From<&crate::config::EngineConfig> for Thresholds {
    fn from(config: &crate::config::EngineConfig) -> Self {
        Self {
            self_emulation_knowledge: config.self_emulation_threshold,
            verification_knowledge: config.verification_knowledge_threshold,
            parity_ratio: config.emulation_parity_ratio,
            verification_required: config.verification_required,
            max_iterations: config.max_iterations,
        }
    }
}

/// Internal over scaffold score. A zero scaffold score counts as parity when
/// the internal score is positive.
pub fn parity_ratio(internal: f64, scaffold: f64) -> f64 {
    if scaffold <= 0.0 {
        return if internal > 0.0 { 1.0 } else { 0.0 };
    }
    internal / scaffold
}

// ---------------------------------------------------------------------------
// PhaseController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseController {
    current: Phase,
    verification_counter: u32,
    history: VecDeque<Transition>,
}

impl Default for PhaseController {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseController {
    pub fn new() -> Self {
        Self {
            current: Phase::Initialization,
            verification_counter: 0,
            history: VecDeque::new(),
        }
    }

    /// Rebuild from persisted fields. History starts with a single
    /// `Restored` entry.
    pub fn restore(phase: Phase, verification_counter: u32, iteration: u64) -> Self {
        let mut controller = Self {
            current: phase,
            verification_counter,
            history: VecDeque::new(),
        };
        controller.push_history(Transition {
            from: phase,
            to: phase,
            reason: TransitionReason::Restored,
            iteration,
            at: Utc::now(),
        });
        controller
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn verification_counter(&self) -> u32 {
        self.verification_counter
    }

    /// Oldest first, at most [`HISTORY_CAP`] entries.
    pub fn history(&self) -> impl Iterator<Item = &Transition> {
        self.history.iter()
    }

    /// Count a verification outcome: a pass increments, a failure resets.
    /// Ignored outside Verification.
    pub fn record_verification(&mut self, passed: bool) -> u32 {
        if self.current != Phase::Verification {
            return self.verification_counter;
        }
        self.verification_counter = if passed {
            self.verification_counter.saturating_add(1)
        } else {
            0
        };
        self.verification_counter
    }

    /// Initialization → Scaffolding once the scaffold is up.
    pub fn scaffold_ready(&mut self, iteration: u64) -> Option<Transition> {
        (self.current == Phase::Initialization)
            .then(|| self.advance(Phase::Scaffolding, TransitionReason::ScaffoldReady, iteration))
    }

    /// Verification → Independent once enough consecutive passes are in.
    /// Checked before a phase step runs.
    pub fn check_verification(
        &mut self,
        thresholds: &Thresholds,
        iteration: u64,
    ) -> Option<Transition> {
        (self.current == Phase::Verification
            && self.verification_counter >= thresholds.verification_required)
            .then(|| {
                self.advance(
                    Phase::Independent,
                    TransitionReason::VerificationComplete,
                    iteration,
                )
            })
    }

    /// Guards checked after a phase step: iteration limit, knowledge
    /// threshold, and emulation parity. `parity` is the internal/scaffold
    /// ratio from this step, when both were scored.
    pub fn check_progress(
        &mut self,
        thresholds: &Thresholds,
        iteration: u64,
        knowledge_size: usize,
        parity: Option<f64>,
    ) -> Option<Transition> {
        if !self.current.is_terminal()
            && self.current != Phase::Initialization
            && iteration >= thresholds.max_iterations
        {
            return Some(self.advance(
                Phase::Independent,
                TransitionReason::IterationLimit,
                iteration,
            ));
        }

        match self.current {
            Phase::Scaffolding if knowledge_size >= thresholds.self_emulation_knowledge => Some(
                self.advance(Phase::SelfEmulation, TransitionReason::KnowledgeThreshold, iteration),
            ),
            Phase::SelfEmulation
                if knowledge_size >= thresholds.verification_knowledge
                    && parity.is_some_and(|ratio| ratio > thresholds.parity_ratio) =>
            {
                Some(self.advance(Phase::Verification, TransitionReason::EmulationParity, iteration))
            }
            _ => None,
        }
    }

    /// Advance one step regardless of guards. No-op when terminal.
    pub fn force_next(&mut self, iteration: u64) -> Option<Transition> {
        if self.current.is_terminal() {
            return None;
        }
        let next = self.current.next();
        Some(self.advance(next, TransitionReason::Forced, iteration))
    }

    fn advance(&mut self, to: Phase, reason: TransitionReason, iteration: u64) -> Transition {
        let transition = Transition {
            from: self.current,
            to,
            reason,
            iteration,
            at: Utc::now(),
        };
        if to == Phase::Verification {
            self.verification_counter = 0;
        }
        self.current = to;
        self.push_history(transition.clone());
        tracing::info!(
            from = %transition.from,
            to = %transition.to,
            reason = %reason,
            iteration,
            "phase transition"
        );
        transition
    }

    fn push_history(&mut self, transition: Transition) {
        self.history.push_back(transition);
        if self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds::from(&crate::config::EngineConfig::default())
    }

    fn scaffolding() -> PhaseController {
        let mut controller = PhaseController::new();
        controller.scaffold_ready(0);
        controller
    }

    // -- Phase --

    #[test]
    fn test_phase_sequence_is_forward_only() {
        let mut phase = Phase::Initialization;
        let mut seen = vec![phase];
        while !phase.is_terminal() {
            let next = phase.next();
            assert!(next > phase);
            phase = next;
            seen.push(phase);
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(Phase::Independent.next(), Phase::Independent);
    }

    #[test]
    fn test_phase_display_matches_serde() {
        for phase in [
            Phase::Initialization,
            Phase::Scaffolding,
            Phase::SelfEmulation,
            Phase::Verification,
            Phase::Independent,
        ] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{phase}\""));
        }
    }

    // -- Guards --

    #[test]
    fn test_scaffold_ready_only_from_initialization() {
        let mut controller = PhaseController::new();
        let transition = controller.scaffold_ready(0).unwrap();
        assert_eq!(transition.to, Phase::Scaffolding);
        assert!(controller.scaffold_ready(1).is_none());
    }

    #[test]
    fn test_knowledge_threshold_promotes_scaffolding() {
        let mut controller = scaffolding();
        assert!(controller.check_progress(&thresholds(), 1, 49, None).is_none());
        let transition = controller.check_progress(&thresholds(), 2, 50, None).unwrap();
        assert_eq!(transition.reason, TransitionReason::KnowledgeThreshold);
        assert_eq!(controller.current(), Phase::SelfEmulation);
    }

    #[test]
    fn test_emulation_parity_needs_ratio_and_size() {
        let mut controller = scaffolding();
        controller.check_progress(&thresholds(), 1, 50, None);

        assert!(controller.check_progress(&thresholds(), 2, 250, Some(0.8)).is_none());
        assert!(controller.check_progress(&thresholds(), 3, 199, Some(0.95)).is_none());
        assert!(controller.check_progress(&thresholds(), 4, 250, None).is_none());
        let transition = controller.check_progress(&thresholds(), 5, 200, Some(0.81)).unwrap();
        assert_eq!(transition.to, Phase::Verification);
    }

    #[test]
    fn test_verification_counter_resets_on_failure() {
        let mut controller = PhaseController::restore(Phase::Verification, 0, 0);
        controller.record_verification(true);
        controller.record_verification(true);
        assert_eq!(controller.verification_counter(), 2);
        controller.record_verification(false);
        assert_eq!(controller.verification_counter(), 0);
    }

    #[test]
    fn test_verification_counter_ignored_elsewhere() {
        let mut controller = scaffolding();
        assert_eq!(controller.record_verification(true), 0);
    }

    #[test]
    fn test_verification_complete_at_required_count() {
        let mut controller = PhaseController::restore(Phase::Verification, 9, 0);
        assert!(controller.check_verification(&thresholds(), 1).is_none());
        controller.record_verification(true);
        let transition = controller.check_verification(&thresholds(), 2).unwrap();
        assert_eq!(transition.to, Phase::Independent);
        assert_eq!(transition.reason, TransitionReason::VerificationComplete);
    }

    #[test]
    fn test_iteration_limit_forces_independent() {
        let mut controller = scaffolding();
        let transition = controller.check_progress(&thresholds(), 1000, 0, None).unwrap();
        assert_eq!(transition.to, Phase::Independent);
        assert_eq!(transition.reason, TransitionReason::IterationLimit);
        assert!(controller.check_progress(&thresholds(), 2000, 500, Some(2.0)).is_none());
    }

    // -- Forcing --

    #[test]
    fn test_force_next_walks_sequence_then_stops() {
        let mut controller = PhaseController::new();
        let mut steps = 0;
        while controller.force_next(steps).is_some() {
            steps += 1;
        }
        assert_eq!(steps, 4);
        assert_eq!(controller.current(), Phase::Independent);
    }

    #[test]
    fn test_entering_verification_clears_counter() {
        let mut controller = PhaseController::restore(Phase::SelfEmulation, 7, 0);
        controller.force_next(1);
        assert_eq!(controller.current(), Phase::Verification);
        assert_eq!(controller.verification_counter(), 0);
    }

    // -- History --

    #[test]
    fn test_history_is_capped() {
        let mut controller = PhaseController::new();
        for iteration in 0..30 {
            controller.push_history(Transition {
                from: Phase::Scaffolding,
                to: Phase::Scaffolding,
                reason: TransitionReason::Restored,
                iteration,
                at: Utc::now(),
            });
        }
        assert_eq!(controller.history().count(), HISTORY_CAP);
        assert_eq!(controller.history().next().unwrap().iteration, 10);
    }

    #[test]
    fn test_parity_ratio_with_zero_scaffold() {
        assert_eq!(parity_ratio(0.5, 0.0), 1.0);
        assert_eq!(parity_ratio(0.0, 0.0), 0.0);
        assert!((parity_ratio(0.45, 0.5) - 0.9).abs() < 1e-9);
    }
}
