//! Fault log, health areas, and inline self-healing.
//!
//! The engine logs a [`Fault`] wherever it degrades instead of failing:
//! generation fallbacks, compliance-degraded collapses, persistence errors,
//! discarded snapshots and emotional imbalance. Each fault lowers the health
//! of its area. [`HealthMonitor::diagnose`] turns low areas and recurring
//! faults into issues, and [`HealthMonitor::heal`] addresses the worst three.

use crate::affect::{Emotion, PrimaryEmotions};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, VecDeque};

const FAULT_LOG_CAP: usize = 100;
const HEALTH_MAX: f64 = 100.0;
const CRITICAL_BELOW: f64 = 50.0;
const RECURRING_AT: usize = 3;
const MAX_HEALED_PER_PASS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthArea {
    KnowledgeIntegrity,
    EmotionalBalance,
    GenerationQuality,
    PersistenceReliability,
}

impl HealthArea {
    pub const ALL: [HealthArea; 4] = [
        HealthArea::KnowledgeIntegrity,
        HealthArea::EmotionalBalance,
        HealthArea::GenerationQuality,
        HealthArea::PersistenceReliability,
    ];
}

impl std::fmt::Display for HealthArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::KnowledgeIntegrity => "knowledge_integrity",
            Self::EmotionalBalance => "emotional_balance",
            Self::GenerationQuality => "generation_quality",
            Self::PersistenceReliability => "persistence_reliability",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    GenerationFallback,
    ComplianceDegraded,
    PersistenceFailure,
    SnapshotDiscarded,
    EmotionalImbalance,
}

impl FaultKind {
    pub fn area(self) -> HealthArea {
        match self {
            Self::GenerationFallback | Self::ComplianceDegraded => HealthArea::GenerationQuality,
            Self::PersistenceFailure => HealthArea::PersistenceReliability,
            Self::SnapshotDiscarded => HealthArea::KnowledgeIntegrity,
            Self::EmotionalImbalance => HealthArea::EmotionalBalance,
        }
    }

    /// Health points one occurrence costs its area.
    pub fn severity(self) -> f64 {
        match self {
            Self::GenerationFallback => 5.0,
            Self::ComplianceDegraded => 3.0,
            Self::PersistenceFailure => 10.0,
            Self::SnapshotDiscarded => 20.0,
            Self::EmotionalImbalance => 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub severity: f64,
    pub detail: String,
    pub at: DateTime<Utc>,
    pub healed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "subject", rename_all = "snake_case")]
pub enum IssueKind {
    /// An area fell below the critical line.
    Critical(HealthArea),
    /// The same fault kind is unhealed at least three times.
    Recurring(FaultKind),
}

impl IssueKind {
    pub fn area(self) -> HealthArea {
        match self {
            Self::Critical(area) => area,
            Self::Recurring(kind) => kind.area(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// 0–10 for critical areas; mean fault severity for recurring faults.
    pub severity: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealingAction {
    pub issue: IssueKind,
    pub area: HealthArea,
    pub restored: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub areas: BTreeMap<HealthArea, f64>,
    pub logged_faults: usize,
    pub unhealed_faults: usize,
    pub open_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMonitor {
    areas: BTreeMap<HealthArea, f64>,
    faults: VecDeque<Fault>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self {
            areas: HealthArea::ALL
                .iter()
                .map(|area| (*area, HEALTH_MAX))
                .collect(),
            faults: VecDeque::new(),
        }
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn area(&self, area: HealthArea) -> f64 {
        self.areas.get(&area).copied().unwrap_or(HEALTH_MAX)
    }

    pub fn faults(&self) -> impl Iterator<Item = &Fault> {
        self.faults.iter()
    }

    pub fn record(&mut self, kind: FaultKind, detail: impl Into<String>) {
        let severity = kind.severity();
        let level = self.areas.entry(kind.area()).or_insert(HEALTH_MAX);
        *level = (*level - severity).max(0.0);
        self.faults.push_back(Fault {
            kind,
            severity,
            detail: detail.into(),
            at: Utc::now(),
            healed: false,
        });
        while self.faults.len() > FAULT_LOG_CAP {
            self.faults.pop_front();
        }
    }

    /// Open issues, most severe first.
    pub fn diagnose(&self) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self
            .areas
            .iter()
            .filter(|(_, level)| **level < CRITICAL_BELOW)
            .map(|(area, level)| Issue {
                kind: IssueKind::Critical(*area),
                severity: (CRITICAL_BELOW - level) / CRITICAL_BELOW * 10.0,
                count: 1,
            })
            .collect();

        let mut recurring: BTreeMap<FaultKind, (usize, f64)> = BTreeMap::new();
        for fault in self.faults.iter().filter(|fault| !fault.healed) {
            let entry = recurring.entry(fault.kind).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += fault.severity;
        }
        issues.extend(
            recurring
                .into_iter()
                .filter(|(_, (count, _))| *count >= RECURRING_AT)
                .map(|(kind, (count, total))| Issue {
                    kind: IssueKind::Recurring(kind),
                    severity: total / count as f64,
                    count,
                }),
        );

        issues.sort_by(|a, b| b.severity.total_cmp(&a.severity));
        issues
    }

    /// Address up to three open issues. Emotional issues pull the most
    /// extreme emotions toward the median; every healed area regains health
    /// and its unhealed faults are marked healed.
    pub fn heal(&mut self, emotions: &mut PrimaryEmotions) -> Vec<HealingAction> {
        let issues = self.diagnose();
        let mut actions = Vec::new();

        for issue in issues.into_iter().take(MAX_HEALED_PER_PASS) {
            let area = issue.kind.area();
            let restored = match area {
                HealthArea::EmotionalBalance => {
                    rebalance(emotions, issue.severity);
                    (issue.severity * 2.5).min(25.0)
                }
                HealthArea::KnowledgeIntegrity => (issue.severity * 3.0).min(30.0),
                HealthArea::GenerationQuality | HealthArea::PersistenceReliability => {
                    (issue.severity * 2.0).min(20.0)
                }
            };
            let level = self.areas.entry(area).or_insert(HEALTH_MAX);
            *level = (*level + restored).min(HEALTH_MAX);
            actions.push(HealingAction {
                issue: issue.kind,
                area,
                restored,
            });
        }

        for fault in self.faults.iter_mut().filter(|fault| !fault.healed) {
            if actions.iter().any(|action| action.area == fault.kind.area()) {
                fault.healed = true;
            }
        }

        if !actions.is_empty() {
            tracing::info!(actions = actions.len(), "self-healing performed");
        }
        actions
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            areas: self.areas.clone(),
            logged_faults: self.faults.len(),
            unhealed_faults: self.faults.iter().filter(|fault| !fault.healed).count(),
            open_issues: self.diagnose().len(),
        }
    }
}

/// Move the three emotions furthest from the median toward it.
fn rebalance(emotions: &mut PrimaryEmotions, severity: f64) {
    let mut levels: Vec<(Emotion, f64)> = Emotion::ALL
        .iter()
        .map(|emotion| (*emotion, emotions.level(*emotion)))
        .collect();
    let mut sorted: Vec<f64> = levels.iter().map(|(_, level)| *level).collect();
    sorted.sort_by(f64::total_cmp);
    let median = (sorted[3] + sorted[4]) / 2.0;

    levels.sort_by(|a, b| (b.1 - median).abs().total_cmp(&(a.1 - median).abs()));
    let pull = (severity / 10.0).min(0.5);
    for (emotion, level) in levels.into_iter().take(3) {
        emotions.update(emotion, (median - level) * pull, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faults_lower_their_area() {
        let mut health = HealthMonitor::new();
        health.record(FaultKind::PersistenceFailure, "disk full");
        health.record(FaultKind::GenerationFallback, "empty store");
        assert_eq!(health.area(HealthArea::PersistenceReliability), 90.0);
        assert_eq!(health.area(HealthArea::GenerationQuality), 95.0);
        assert_eq!(health.area(HealthArea::KnowledgeIntegrity), 100.0);
        assert!(health.diagnose().is_empty());
    }

    #[test]
    fn recurring_faults_become_issues() {
        let mut health = HealthMonitor::new();
        for _ in 0..3 {
            health.record(FaultKind::ComplianceDegraded, "all candidates rejected");
        }
        let issues = health.diagnose();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Recurring(FaultKind::ComplianceDegraded));
        assert_eq!(issues[0].count, 3);
        assert_eq!(issues[0].severity, 3.0);
    }

    #[test]
    fn critical_area_outranks_recurring_fault() {
        let mut health = HealthMonitor::new();
        for _ in 0..3 {
            health.record(FaultKind::SnapshotDiscarded, "corrupt");
        }
        health.record(FaultKind::GenerationFallback, "a");
        health.record(FaultKind::GenerationFallback, "b");
        health.record(FaultKind::GenerationFallback, "c");

        let issues = health.diagnose();
        assert_eq!(issues[0].kind, IssueKind::Recurring(FaultKind::SnapshotDiscarded));
        assert!(issues.iter().any(|issue| issue.kind == IssueKind::Critical(HealthArea::KnowledgeIntegrity)));
        assert!(issues.iter().any(|issue| issue.kind == IssueKind::Recurring(FaultKind::GenerationFallback)));
    }

    #[test]
    fn heal_restores_health_and_marks_faults() {
        let mut health = HealthMonitor::new();
        let mut emotions = PrimaryEmotions::default();
        for _ in 0..3 {
            health.record(FaultKind::GenerationFallback, "fallback");
        }
        let actions = health.heal(&mut emotions);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].area, HealthArea::GenerationQuality);
        assert_eq!(health.area(HealthArea::GenerationQuality), 95.0);
        assert!(health.faults().all(|fault| fault.healed));
        assert!(health.diagnose().is_empty());
        assert!(health.heal(&mut emotions).is_empty());
    }

    #[test]
    fn emotional_healing_pulls_toward_median() {
        let mut health = HealthMonitor::new();
        let mut emotions = PrimaryEmotions::default();
        emotions.update(Emotion::Anger, 50.0, 1.0);
        for _ in 0..3 {
            health.record(FaultKind::EmotionalImbalance, "anger spike");
        }
        let before = emotions.level(Emotion::Anger);
        health.heal(&mut emotions);
        assert!(emotions.level(Emotion::Anger) < before);
        assert!(emotions.level(Emotion::Anger) >= 50.0);
    }

    #[test]
    fn fault_log_is_bounded() {
        let mut health = HealthMonitor::new();
        for index in 0..(FAULT_LOG_CAP + 5) {
            health.record(FaultKind::ComplianceDegraded, format!("fault {index}"));
        }
        assert_eq!(health.faults().count(), FAULT_LOG_CAP);
        assert_eq!(health.area(HealthArea::GenerationQuality), 0.0);
        assert_eq!(health.status().logged_faults, FAULT_LOG_CAP);
    }
}
