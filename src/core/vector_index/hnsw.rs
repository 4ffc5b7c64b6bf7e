//! A Hierarchical Navigable Small World graph, grounded on
//! `core::indexing::hnsw::graph::HnswGraph`'s layered-connections design
//! (multi-layer `HashSet<NodeId>` adjacency, greedy descent from an entry
//! point), generalized to carry a configurable `Metric` and to support
//! tombstoning so deleted entities remain addressable by internal id
//! without renumbering every other node.

use super::distance::Metric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BinaryHeap, HashSet};

pub type NodeId = usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HnswNode {
    vector: Vec<f32>,
    layer: usize,
    connections: Vec<HashSet<NodeId>>,
    deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswGraph {
    metric: Metric,
    dim: usize,
    m: usize,
    ef_construction: usize,
    nodes: Vec<HnswNode>,
    entry_point: Option<NodeId>,
}

struct ScoredNode {
    id: NodeId,
    distance: f32,
}
impl PartialEq for ScoredNode {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for ScoredNode {}
impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredNode {
    // Max-heap by distance; callers that want a min-heap wrap in `Reverse`.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

impl HnswGraph {
    pub fn new(metric: Metric, dim: usize, m: usize, ef_construction: usize) -> Self {
        Self { metric, dim, m, ef_construction, nodes: Vec::new(), entry_point: None }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn random_layer(&self) -> usize {
        let mut rng = rand::thread_rng();
        let uniform: f64 = rng.gen_range(0.0..1.0_f64).max(1e-12);
        let level_mult = 1.0 / (self.m as f64).ln().max(1.0);
        (-uniform.ln() * level_mult).floor() as usize
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.metric.distance(a, b)
    }

    /// Greedy single-best search at one layer, used to descend from the
    /// entry point down to layer 0 before the beam search there.
    fn greedy_closest(&self, query: &[f32], layer: usize, from: NodeId) -> NodeId {
        let mut current = from;
        let mut current_dist = self.distance(query, &self.nodes[current].vector);
        loop {
            let mut improved = false;
            if let Some(conns) = self.nodes[current].connections.get(layer) {
                for &neighbor in conns {
                    if self.nodes[neighbor].deleted {
                        continue;
                    }
                    let d = self.distance(query, &self.nodes[neighbor].vector);
                    if d < current_dist {
                        current_dist = d;
                        current = neighbor;
                        improved = true;
                    }
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Beam search at `layer`, returning up to `ef` candidates ordered by
    /// ascending distance (best first).
    fn search_layer(&self, query: &[f32], entry: NodeId, ef: usize, layer: usize) -> Vec<ScoredNode> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(entry);
        let entry_dist = self.distance(query, &self.nodes[entry].vector);
        let mut candidates: BinaryHeap<std::cmp::Reverse<OrderedScored>> =
            BinaryHeap::new();
        candidates.push(std::cmp::Reverse(OrderedScored { id: entry, distance: entry_dist }));
        let mut found: Vec<ScoredNode> = vec![ScoredNode { id: entry, distance: entry_dist }];

        while let Some(std::cmp::Reverse(OrderedScored { id: current, distance: current_dist })) = candidates.pop() {
            let worst_found = found.iter().map(|s| s.distance).fold(f32::NEG_INFINITY, f32::max);
            if found.len() >= ef && current_dist > worst_found {
                break;
            }
            if let Some(conns) = self.nodes[current].connections.get(layer) {
                for &neighbor in conns {
                    if !visited.insert(neighbor) || self.nodes[neighbor].deleted {
                        continue;
                    }
                    let d = self.distance(query, &self.nodes[neighbor].vector);
                    candidates.push(std::cmp::Reverse(OrderedScored { id: neighbor, distance: d }));
                    found.push(ScoredNode { id: neighbor, distance: d });
                }
            }
        }
        found.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        found.truncate(ef.max(1));
        found
    }

    /// Inserts `vector`, returning its freshly allocated internal id.
    pub fn insert(&mut self, vector: Vec<f32>) -> NodeId {
        let layer = self.random_layer();
        let id = self.nodes.len();
        self.nodes.push(HnswNode {
            vector: vector.clone(),
            layer,
            connections: (0..=layer).map(|_| HashSet::new()).collect(),
            deleted: false,
        });

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(id);
            return id;
        };

        let entry_layer = self.nodes[entry].layer;
        let mut current = entry;
        for l in (layer + 1..=entry_layer).rev() {
            current = self.greedy_closest(&vector, l, current);
        }

        for l in (0..=layer.min(entry_layer)).rev() {
            let candidates = self.search_layer(&vector, current, self.ef_construction, l);
            let chosen: Vec<NodeId> = candidates.iter().take(self.m).map(|c| c.id).collect();
            for &neighbor in &chosen {
                self.nodes[id].connections[l].insert(neighbor);
                if let Some(conns) = self.nodes[neighbor].connections.get_mut(l) {
                    conns.insert(id);
                    if conns.len() > self.m * 2 {
                        self.prune_connections(neighbor, l);
                    }
                }
            }
            if let Some(&best) = chosen.first() {
                current = best;
            }
        }

        if layer > entry_layer {
            self.entry_point = Some(id);
        }
        id
    }

    fn prune_connections(&mut self, node: NodeId, layer: usize) {
        let vector = self.nodes[node].vector.clone();
        let mut scored: Vec<ScoredNode> = self.nodes[node].connections[layer]
            .iter()
            .map(|&n| ScoredNode { id: n, distance: self.distance(&vector, &self.nodes[n].vector) })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(self.m);
        self.nodes[node].connections[layer] = scored.into_iter().map(|s| s.id).collect();
    }

    /// Returns up to `ef` nearest live nodes to `query`, ordered ascending
    /// by distance.
    pub fn search(&self, query: &[f32], ef: usize) -> Vec<(NodeId, f32)> {
        let Some(entry) = self.entry_point else { return Vec::new() };
        let entry_layer = self.nodes[entry].layer;
        let mut current = entry;
        for l in (1..=entry_layer).rev() {
            current = self.greedy_closest(query, l, current);
        }
        self.search_layer(query, current, ef.max(1), 0)
            .into_iter()
            .filter(|c| !self.nodes[c.id].deleted)
            .map(|c| (c.id, c.distance))
            .collect()
    }

    pub fn mark_deleted(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.deleted = true;
        }
        if self.entry_point == Some(id) {
            self.entry_point = self.nodes.iter().position(|n| !n.deleted);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| !n.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(PartialEq)]
struct OrderedScored {
    id: NodeId,
    distance: f32,
}
impl Eq for OrderedScored {}
impl PartialOrd for OrderedScored {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedScored {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_with_k_1_returns_the_inserted_point_itself() {
        let mut g = HnswGraph::new(Metric::Cosine, 3, 16, 64);
        let v = Metric::Cosine.prepare(&[1.0, 0.0, 0.0]);
        let id = g.insert(v.clone());
        let results = g.search(&v, 1);
        assert_eq!(results[0].0, id);
    }

    #[test]
    fn tombstoned_node_is_excluded_from_search() {
        let mut g = HnswGraph::new(Metric::L2, 2, 16, 64);
        let a = g.insert(vec![0.0, 0.0]);
        let _b = g.insert(vec![10.0, 10.0]);
        g.mark_deleted(a);
        let results = g.search(&[0.0, 0.0], 2);
        assert!(results.iter().all(|(id, _)| *id != a));
    }

    #[test]
    fn nearest_neighbor_ranks_closer_points_first() {
        let mut g = HnswGraph::new(Metric::L2, 1, 16, 64);
        let far = g.insert(vec![100.0]);
        let near = g.insert(vec![1.0]);
        let results = g.search(&[0.0], 2);
        assert_eq!(results[0].0, near);
        assert_eq!(results[1].0, far);
    }
}
