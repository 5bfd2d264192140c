//! Weighted word-graphs used by the graph variant.
//!
//! Each [`ResponseGraph`] is grown from exactly one (input, output) pair. Its
//! nodes are the distinct tokens of the pair (input first), and every input
//! token links to every output token with a weight that decays with
//! positional distance. [`GraphStore`] caps the set and evicts the least
//! frequently activated graph, breaking ties by least recent activation.

use crate::affect::EmotionalMapping;
use crate::random::RandomSource;
use crate::text;
use crate::truth;

use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashSet};

/// Word-graph built from one observed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseGraph {
    pub id: u64,
    pub word_nodes: Vec<String>,
    /// `(from, to, weight)` over indices into `word_nodes`.
    pub edges: Vec<(usize, usize, f64)>,
    pub emotional_mapping: EmotionalMapping,
    /// Token counts across input and output.
    pub frequency_response: BTreeMap<String, u32>,
    pub truth_stratification: f64,
    /// Store clock value at the last activation (or creation).
    pub last_activation: u64,
    pub activation_count: u64,
}

impl ResponseGraph {
    pub fn build(id: u64, input: &str, output: &str, emotional_mapping: EmotionalMapping) -> Self {
        let input_tokens = text::tokenize(input);
        let output_tokens = text::tokenize(output);
        let word_nodes = text::distinct_in_order(input_tokens.iter().chain(&output_tokens));
        let index_of = |token: &String| word_nodes.iter().position(|node| node == token);

        let span = input_tokens.len().max(output_tokens.len()).max(1) as f64;
        let mut weights: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (i, from_token) in input_tokens.iter().enumerate() {
            let Some(from) = index_of(from_token) else {
                continue;
            };
            for (j, to_token) in output_tokens.iter().enumerate() {
                let Some(to) = index_of(to_token) else {
                    continue;
                };
                if from == to {
                    continue;
                }
                let weight = 1.0 - (i as f64 - j as f64).abs() / span;
                let slot = weights.entry((from, to)).or_insert(0.0);
                *slot = slot.max(weight);
            }
        }

        let mut frequency_response = BTreeMap::new();
        for token in input_tokens.iter().chain(&output_tokens) {
            *frequency_response.entry(token.clone()).or_insert(0) += 1;
        }

        Self {
            id,
            word_nodes,
            edges: weights
                .into_iter()
                .map(|((from, to), weight)| (from, to, weight))
                .collect(),
            emotional_mapping,
            frequency_response,
            truth_stratification: truth::stratification(output),
            last_activation: 0,
            activation_count: 0,
        }
    }

    /// Node indices whose token appears in `query`.
    pub fn matching_nodes(&self, query: &HashSet<String>) -> Vec<usize> {
        self.word_nodes
            .iter()
            .enumerate()
            .filter(|(_, token)| query.contains(*token))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn matches(&self, query: &HashSet<String>) -> bool {
        self.word_nodes.iter().any(|token| query.contains(token))
    }

    pub fn outgoing(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.edges
            .iter()
            .filter(move |(from, _, _)| *from == node)
            .map(|(_, to, weight)| (*to, *weight))
    }

    /// Weighted random walk from a random query-matching node. Each step
    /// follows an outgoing edge chosen proportionally to its weight; the walk
    /// ends after `max_steps` steps (`max_steps + 1` nodes) or at a node with
    /// no outgoing edges.
    /// Returns the visited tokens; empty when no node matches.
    pub fn walk(
        &self,
        query: &HashSet<String>,
        max_steps: usize,
        rng: &mut dyn RandomSource,
    ) -> Vec<String> {
        let starts = self.matching_nodes(query);
        if starts.is_empty() {
            return Vec::new();
        }
        let mut node = starts[rng.pick(starts.len())];
        let mut visited = vec![self.word_nodes[node].clone()];

        for _ in 0..max_steps {
            let (targets, weights): (Vec<usize>, Vec<f64>) = self.outgoing(node).unzip();
            let Some(choice) = rng.pick_weighted(&weights) else {
                break;
            };
            node = targets[choice];
            visited.push(self.word_nodes[node].clone());
        }
        visited
    }
}

/// Capped set of response graphs with LFU eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStore {
    capacity: usize,
    graphs: Vec<ResponseGraph>,
    next_id: u64,
    clock: u64,
}

impl GraphStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            graphs: Vec::new(),
            next_id: 1,
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn graphs(&self) -> &[ResponseGraph] {
        &self.graphs
    }

    pub fn get(&self, id: u64) -> Option<&ResponseGraph> {
        self.graphs.iter().find(|graph| graph.id == id)
    }

    /// Build a graph from the pair, insert it, and evict down to capacity.
    /// Returns the number of graphs evicted.
    pub fn absorb(&mut self, input: &str, output: &str, mapping: EmotionalMapping) -> usize {
        let mut graph = ResponseGraph::build(self.next_id, input, output, mapping);
        self.next_id += 1;
        self.clock += 1;
        graph.last_activation = self.clock;
        self.graphs.push(graph);

        let mut evicted = 0;
        while self.graphs.len() > self.capacity {
            let Some(victim) = self.eviction_candidate() else {
                break;
            };
            let removed = self.graphs.remove(victim);
            tracing::debug!(
                graph_id = removed.id,
                activations = removed.activation_count,
                "evicted response graph"
            );
            evicted += 1;
        }
        evicted
    }

    /// Record one use of the graph.
    pub fn activate(&mut self, id: u64) {
        self.clock += 1;
        let clock = self.clock;
        if let Some(graph) = self.graphs.iter_mut().find(|graph| graph.id == id) {
            graph.activation_count += 1;
            graph.last_activation = clock;
        }
    }

    /// Ids of graphs sharing a token with `query`, most activated first.
    pub fn matching(&self, query: &HashSet<String>) -> Vec<u64> {
        let mut matching: Vec<&ResponseGraph> = self
            .graphs
            .iter()
            .filter(|graph| graph.matches(query))
            .collect();
        matching.sort_by(|a, b| {
            b.activation_count
                .cmp(&a.activation_count)
                .then(b.last_activation.cmp(&a.last_activation))
        });
        matching.into_iter().map(|graph| graph.id).collect()
    }

    /// Least activated graph, oldest activation first on ties. The most
    /// recently inserted graph is never a candidate.
    fn eviction_candidate(&self) -> Option<usize> {
        let settled = self.graphs.len().saturating_sub(1);
        self.graphs[..settled]
            .iter()
            .enumerate()
            .min_by_key(|(_, graph)| (graph.activation_count, graph.last_activation))
            .map(|(index, _)| index)
    }
}
