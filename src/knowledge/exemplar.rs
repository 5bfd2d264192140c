//! Flat exemplar log used by the basic variant.

use crate::metrics::Metrics;
use crate::text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::{HashSet, VecDeque};

/// One observed (input, output) exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeUnit {
    pub input: String,
    pub output: String,
    /// Distinct input tokens, used for overlap ranking.
    pub tokens: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub metrics: Metrics,
}

impl KnowledgeUnit {
    pub fn new(input: &str, output: &str, metrics: Metrics) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            tokens: text::distinct_in_order(&text::tokenize(input)),
            timestamp: Utc::now(),
            metrics,
        }
    }

    /// Number of this unit's tokens present in `query`.
    pub fn overlap(&self, query: &HashSet<String>) -> usize {
        self.tokens
            .iter()
            .filter(|token| query.contains(*token))
            .count()
    }
}

/// Append-only log capped at `capacity`; the oldest unit is evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExemplarLog {
    capacity: usize,
    units: VecDeque<KnowledgeUnit>,
}

impl ExemplarLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            units: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn units(&self) -> impl DoubleEndedIterator<Item = &KnowledgeUnit> {
        self.units.iter()
    }

    /// Append a unit and evict down to capacity. Returns the number evicted.
    pub fn push(&mut self, unit: KnowledgeUnit) -> usize {
        self.units.push_back(unit);
        let mut evicted = 0;
        while self.units.len() > self.capacity {
            self.units.pop_front();
            evicted += 1;
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_tokens_are_distinct_input_tokens() {
        let unit = KnowledgeUnit::new("the cat and the hat", "rhymes", Metrics::default());
        assert_eq!(unit.tokens, vec!["the", "cat", "and", "hat"]);
        let query = text::token_set("a cat in a hat");
        assert_eq!(unit.overlap(&query), 2);
    }

    #[test]
    fn push_evicts_oldest_first() {
        let mut log = ExemplarLog::new(3);
        for step in 0..5 {
            let evicted = log.push(KnowledgeUnit::new(
                &format!("input {step}"),
                "output",
                Metrics::default(),
            ));
            assert_eq!(evicted, usize::from(step >= 3));
        }
        assert_eq!(log.len(), 3);
        let inputs: Vec<&str> = log.units().map(|unit| unit.input.as_str()).collect();
        assert_eq!(inputs, vec!["input 2", "input 3", "input 4"]);
    }
}
