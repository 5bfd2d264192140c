//! Rewards and penalties that feed the primary emotions.
//!
//! Each incentive has a base value that is scaled by a reward or penalty
//! factor and then mapped onto one or two emotions. The factors adapt to the
//! performance trend: an improving engine gets smaller rewards and sharper
//! penalties, a declining one the reverse.

use crate::affect::{Emotion, PrimaryEmotions};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::VecDeque;

/// Decay applied to the other emotions on every incentive update.
const INCENTIVE_DECAY: f64 = 0.9;
/// Trend magnitude beyond which the scaling factors move.
const ADAPT_TREND: f64 = 0.02;
const SCALING_MIN: f64 = 0.5;
const SCALING_MAX: f64 = 1.5;
const HISTORY_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reward {
    /// Input the engine has not seen recently.
    Curiosity,
    /// Internal output passed verification.
    Efficiency,
    /// Knowledge absorbed from a better scaffold answer.
    Cooperation,
    /// Internal output matched or beat the scaffold.
    Innovation,
}

impl Reward {
    fn base(self) -> f64 {
        match self {
            Self::Curiosity => 5.0,
            Self::Efficiency => 3.0,
            Self::Cooperation => 4.0,
            Self::Innovation => 6.0,
        }
    }

    fn effects(self) -> [(Emotion, f64); 2] {
        match self {
            Self::Curiosity => [(Emotion::Surprise, 0.5), (Emotion::Joy, 0.3)],
            Self::Efficiency => [(Emotion::Joy, 0.4), (Emotion::Trust, 0.2)],
            Self::Cooperation => [(Emotion::Trust, 0.5), (Emotion::Joy, 0.2)],
            Self::Innovation => [(Emotion::Surprise, 0.3), (Emotion::Joy, 0.4)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    /// Internal generation failed and fell back.
    Error,
    /// Scaffold consulted in a phase that should answer internally.
    ResourceWaste,
    /// Every candidate failed truth compliance.
    Conflict,
    /// Inputs stopped varying.
    Stagnation,
}

impl Penalty {
    fn base(self) -> f64 {
        match self {
            Self::Error => -3.0,
            Self::ResourceWaste => -4.0,
            Self::Conflict => -5.0,
            Self::Stagnation => -2.0,
        }
    }

    fn effects(self) -> [(Emotion, f64); 2] {
        match self {
            Self::Error => [(Emotion::Sadness, 0.4), (Emotion::Surprise, 0.2)],
            Self::ResourceWaste => [(Emotion::Disgust, 0.3), (Emotion::Anger, 0.3)],
            Self::Conflict => [(Emotion::Anger, 0.5), (Emotion::Fear, 0.2)],
            Self::Stagnation => [(Emotion::Sadness, 0.4), (Emotion::Disgust, 0.2)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum Incentive {
    Reward(Reward),
    Penalty(Penalty),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncentiveRecord {
    pub incentive: Incentive,
    pub value: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncentiveSummary {
    pub reward_scaling: f64,
    pub penalty_scaling: f64,
    pub total: f64,
    pub recorded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncentiveSystem {
    reward_scaling: f64,
    penalty_scaling: f64,
    history: VecDeque<IncentiveRecord>,
}

impl Default for IncentiveSystem {
    fn default() -> Self {
        Self {
            reward_scaling: 1.0,
            penalty_scaling: 1.0,
            history: VecDeque::new(),
        }
    }
}

impl IncentiveSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reward_scaling(&self) -> f64 {
        self.reward_scaling
    }

    pub fn penalty_scaling(&self) -> f64 {
        self.penalty_scaling
    }

    /// Apply a reward of `magnitude` and return its scaled (positive) value.
    pub fn reward(&mut self, reward: Reward, magnitude: f64, emotions: &mut PrimaryEmotions) -> f64 {
        let value = reward.base() * magnitude * self.reward_scaling;
        for (emotion, share) in reward.effects() {
            emotions.update(emotion, value * share, INCENTIVE_DECAY);
        }
        self.record(Incentive::Reward(reward), value);
        value
    }

    /// Apply a penalty of `magnitude` and return its scaled (negative) value.
    pub fn penalize(
        &mut self,
        penalty: Penalty,
        magnitude: f64,
        emotions: &mut PrimaryEmotions,
    ) -> f64 {
        let value = penalty.base() * magnitude * self.penalty_scaling;
        for (emotion, share) in penalty.effects() {
            emotions.update(emotion, -value * share, INCENTIVE_DECAY);
        }
        self.record(Incentive::Penalty(penalty), value);
        value
    }

    fn record(&mut self, incentive: Incentive, value: f64) {
        tracing::debug!(?incentive, value, "incentive applied");
        self.history.push_back(IncentiveRecord {
            incentive,
            value,
            at: Utc::now(),
        });
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
    }

    /// Records newer than `window`, oldest first.
    pub fn recent(&self, window: chrono::Duration) -> impl Iterator<Item = &IncentiveRecord> {
        let cutoff = Utc::now() - window;
        self.history.iter().filter(move |record| record.at >= cutoff)
    }

    pub fn total(&self) -> f64 {
        self.history.iter().map(|record| record.value).sum()
    }

    /// Shift the scaling factors against the performance trend.
    pub fn adapt(&mut self, performance_trend: f64) {
        if performance_trend > ADAPT_TREND {
            self.reward_scaling = (self.reward_scaling * 0.95).max(SCALING_MIN);
            self.penalty_scaling = (self.penalty_scaling * 1.05).min(SCALING_MAX);
        } else if performance_trend < -ADAPT_TREND {
            self.reward_scaling = (self.reward_scaling * 1.05).min(SCALING_MAX);
            self.penalty_scaling = (self.penalty_scaling * 0.95).max(SCALING_MIN);
        }
    }

    pub fn summary(&self) -> IncentiveSummary {
        IncentiveSummary {
            reward_scaling: self.reward_scaling,
            penalty_scaling: self.penalty_scaling,
            total: self.total(),
            recorded: self.history.len(),
        }
    }
}
