//! BFS, Dijkstra, and A* traversals over the adjacency index, plus the
//! temporal edge-property aggregates. Grounded on
//! `core::graph::algorithms::PathFinder`'s min-heap skeleton, generalized
//! to read neighbors from `GraphIndexManager`'s adjacency keys (or loaded
//! topology) instead of an in-memory `GraphStore`, and to support an
//! edge-type filter at every step.

use super::{Edge, GraphIndexManager};
use crate::core::common::error::Result;
use crate::core::keys;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

#[derive(Debug, Clone, Default)]
pub struct TemporalStats {
    pub edge_count: u64,
    pub bounded_edge_count: u64,
    pub total_duration_ms: i64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: Option<i64>,
    pub max_duration_ms: Option<i64>,
    pub earliest_start: Option<i64>,
    pub latest_end: Option<i64>,
}

struct HeapItem {
    node: String,
    cost: f64,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}
impl Eq for HeapItem {}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties break by pk per the spec.
        other.cost.total_cmp(&self.cost).then_with(|| other.node.cmp(&self.node))
    }
}

impl GraphIndexManager {
    fn filtered_out_edges(&self, graph_id: &str, node: &str, type_filter: Option<&str>) -> Result<Vec<(String, String)>> {
        let adj = self.out_adjacency(graph_id, node)?;
        match type_filter {
            None => Ok(adj),
            Some(t) => {
                let mut kept = Vec::new();
                for (eid, to) in adj {
                    if let Some(edge) = self.get_edge(&eid)? {
                        if edge.edge_type.as_deref() == Some(t) {
                            kept.push((eid, to));
                        }
                    }
                }
                Ok(kept)
            }
        }
    }

    /// Breadth-first visit order starting at `start`, bounded by
    /// `max_depth`, optionally following only edges of `type_filter`.
    pub fn bfs(&self, graph_id: &str, start: &str, max_depth: usize, type_filter: Option<&str>) -> Result<Vec<String>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((start.to_string(), 0));
        visited.insert(start.to_string());

        while let Some((node, depth)) = queue.pop_front() {
            order.push(node.clone());
            if depth >= max_depth {
                continue;
            }
            for (_, to) in self.filtered_out_edges(graph_id, &node, type_filter)? {
                if visited.insert(to.clone()) {
                    queue.push_back((to, depth + 1));
                }
            }
        }
        Ok(order)
    }

    /// Dijkstra shortest path by edge weight (`_weight`, default `1.0`).
    /// Returns `None` if `target` is unreachable.
    pub fn dijkstra(
        &self,
        graph_id: &str,
        start: &str,
        target: &str,
        type_filter: Option<&str>,
    ) -> Result<Option<(Vec<String>, f64)>> {
        self.a_star(graph_id, start, target, |_| 0.0, type_filter)
    }

    /// A* shortest path with an admissible heuristic `h(node) -> cost`.
    /// A heuristic returning `0.0` everywhere degenerates to Dijkstra.
    pub fn a_star(
        &self,
        graph_id: &str,
        start: &str,
        target: &str,
        heuristic: impl Fn(&str) -> f64,
        type_filter: Option<&str>,
    ) -> Result<Option<(Vec<String>, f64)>> {
        let mut g_score: HashMap<String, f64> = HashMap::new();
        let mut came_from: HashMap<String, String> = HashMap::new();
        let mut open = BinaryHeap::new();

        g_score.insert(start.to_string(), 0.0);
        open.push(HeapItem { node: start.to_string(), cost: heuristic(start) });

        let mut visited: HashSet<String> = HashSet::new();
        while let Some(HeapItem { node: current, .. }) = open.pop() {
            if current == target {
                let mut path = vec![current.clone()];
                let mut cur = current;
                while let Some(parent) = came_from.get(&cur) {
                    path.push(parent.clone());
                    cur = parent.clone();
                }
                path.reverse();
                return Ok(Some((path, g_score[target])));
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            let current_g = g_score.get(&current).copied().unwrap_or(f64::INFINITY);
            for (eid, to) in self.filtered_out_edges(graph_id, &current, type_filter)? {
                let edge = self.get_edge(&eid)?;
                let weight = edge.map_or(1.0, |e| e.cost());
                let tentative = current_g + weight;
                if tentative < g_score.get(&to).copied().unwrap_or(f64::INFINITY) {
                    came_from.insert(to.clone(), current.clone());
                    g_score.insert(to.clone(), tentative);
                    open.push(HeapItem { node: to.clone(), cost: tentative + heuristic(&to) });
                }
            }
        }
        Ok(None)
    }

    fn overlaps(window_lo: i64, window_hi: i64, edge: &Edge, fully_contained: bool) -> bool {
        let from = edge.valid_from.unwrap_or(i64::MIN);
        let to = edge.valid_to.unwrap_or(i64::MAX);
        if fully_contained {
            from >= window_lo && to <= window_hi
        } else {
            from <= window_hi && to >= window_lo
        }
    }

    fn scan_all_edges(&self, mut visit: impl FnMut(Edge)) -> Result<()> {
        let mut err = None;
        self.store().scan_prefix(b"edge:", |_, v| {
            match serde_json::from_slice::<Edge>(v) {
                Ok(edge) => visit(edge),
                Err(e) => err = Some(crate::core::common::error::ThemisError::Serialization(e.to_string())),
            }
            true
        })?;
        if let Some(e) = err {
            return Err(e);
        }
        Ok(())
    }

    /// Aggregates a named edge property over edges whose validity window
    /// overlaps (or is fully contained in, per `fully_contained`)
    /// `[lo, hi]`. `COUNT` counts matching edges regardless of whether the
    /// property is numeric; every other op counts only edges carrying a
    /// numeric value for `prop`.
    pub fn aggregate_edge_property_in_time_range(
        &self,
        prop: &str,
        op: AggregateOp,
        lo: i64,
        hi: i64,
        fully_contained: bool,
        type_filter: Option<&str>,
    ) -> Result<f64> {
        let mut sum = 0.0;
        let mut count = 0u64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut matched_edges = 0u64;

        self.scan_all_edges(|edge| {
            if let Some(t) = type_filter {
                if edge.edge_type.as_deref() != Some(t) {
                    return;
                }
            }
            if !Self::overlaps(lo, hi, &edge, fully_contained) {
                return;
            }
            matched_edges += 1;
            if op == AggregateOp::Count {
                return;
            }
            if let Some(v) = edge.property_f64(prop) {
                sum += v;
                count += 1;
                min = min.min(v);
                max = max.max(v);
            }
        })?;

        Ok(match op {
            AggregateOp::Count => matched_edges as f64,
            AggregateOp::Sum => sum,
            AggregateOp::Avg => {
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64
                }
            }
            AggregateOp::Min => {
                if count == 0 {
                    0.0
                } else {
                    min
                }
            }
            AggregateOp::Max => {
                if count == 0 {
                    0.0
                } else {
                    max
                }
            }
        })
    }

    pub fn get_temporal_stats(&self, lo: i64, hi: i64, fully_contained: bool) -> Result<TemporalStats> {
        let mut stats = TemporalStats::default();
        let mut durations = Vec::new();

        self.scan_all_edges(|edge| {
            stats.edge_count += 1;
            if !Self::overlaps(lo, hi, &edge, fully_contained) {
                return;
            }
            stats.bounded_edge_count += 1;
            if let (Some(from), Some(to)) = (edge.valid_from, edge.valid_to) {
                let duration = to - from;
                durations.push(duration);
                stats.total_duration_ms += duration;
                stats.earliest_start = Some(stats.earliest_start.map_or(from, |e: i64| e.min(from)));
                stats.latest_end = Some(stats.latest_end.map_or(to, |l: i64| l.max(to)));
            }
        })?;

        if !durations.is_empty() {
            stats.avg_duration_ms = stats.total_duration_ms as f64 / durations.len() as f64;
            stats.min_duration_ms = durations.iter().copied().min();
            stats.max_duration_ms = durations.iter().copied().max();
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::{LsmKvStore, StoreConfig};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GraphIndexManager) {
        let dir = TempDir::new().unwrap();
        let store =
            Arc::new(LsmKvStore::open(StoreConfig { db_path: dir.path().to_path_buf(), ..Default::default() }).unwrap());
        (dir, GraphIndexManager::new(store))
    }

    /// a-FOLLOWS->b-FOLLOWS->c, a-LIKES->d-LIKES->c, all weight 1.
    fn build_scenario(mgr: &GraphIndexManager) {
        mgr.add_edge("g", Edge::new("e1", "a", "b").with_type("FOLLOWS").with_weight(1.0)).unwrap();
        mgr.add_edge("g", Edge::new("e2", "b", "c").with_type("FOLLOWS").with_weight(1.0)).unwrap();
        mgr.add_edge("g", Edge::new("e3", "a", "d").with_type("LIKES").with_weight(1.0)).unwrap();
        mgr.add_edge("g", Edge::new("e4", "d", "c").with_type("LIKES").with_weight(1.0)).unwrap();
    }

    #[test]
    fn dijkstra_with_type_filter_takes_the_typed_path() {
        let (_dir, mgr) = setup();
        build_scenario(&mgr);

        let (path, cost) = mgr.dijkstra("g", "a", "c", Some("FOLLOWS")).unwrap().unwrap();
        assert_eq!(path, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(cost, 2.0);

        let (path2, cost2) = mgr.dijkstra("g", "a", "c", Some("LIKES")).unwrap().unwrap();
        assert_eq!(path2, vec!["a".to_string(), "d".to_string(), "c".to_string()]);
        assert_eq!(cost2, 2.0);
    }

    #[test]
    fn dijkstra_unfiltered_finds_some_shortest_path() {
        let (_dir, mgr) = setup();
        build_scenario(&mgr);
        let (_path, cost) = mgr.dijkstra("g", "a", "c", None).unwrap().unwrap();
        assert_eq!(cost, 2.0);
    }

    #[test]
    fn bfs_respects_max_depth() {
        let (_dir, mgr) = setup();
        build_scenario(&mgr);
        let visited = mgr.bfs("g", "a", 1, None).unwrap();
        assert!(visited.contains(&"a".to_string()));
        assert!(visited.contains(&"b".to_string()) || visited.contains(&"d".to_string()));
        assert!(!visited.contains(&"c".to_string()));
    }

    #[test]
    fn dijkstra_returns_none_when_unreachable() {
        let (_dir, mgr) = setup();
        mgr.add_edge("g", Edge::new("e1", "a", "b")).unwrap();
        assert!(mgr.dijkstra("g", "a", "zzz", None).unwrap().is_none());
    }

    #[test]
    fn a_star_with_zero_heuristic_matches_dijkstra_cost() {
        let (_dir, mgr) = setup();
        build_scenario(&mgr);
        let (_path, cost) = mgr.a_star("g", "a", "c", |_| 0.0, None).unwrap().unwrap();
        assert_eq!(cost, 2.0);
    }

    #[test]
    fn aggregate_counts_edges_overlapping_window() {
        let (_dir, mgr) = setup();
        mgr.add_edge("g", Edge::new("e1", "a", "b").with_validity(Some(0), Some(100))).unwrap();
        mgr.add_edge("g", Edge::new("e2", "b", "c").with_validity(Some(200), Some(300))).unwrap();
        let count = mgr.aggregate_edge_property_in_time_range("weight", AggregateOp::Count, 0, 150, false, None).unwrap();
        assert_eq!(count, 1.0);
    }
}
