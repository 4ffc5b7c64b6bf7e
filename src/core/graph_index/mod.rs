//! Graph Index Manager: edge storage plus the out/in adjacency indexes
//! that make neighbor queries and traversals prefix scans. Grounded on
//! `core::graph::storage::GraphStore`'s edge-record shape, generalized
//! from a single-graph store to the spec's `graph_id`-scoped multi-graph
//! adjacency families, and on `core::graph::algorithms::PathFinder` for
//! the traversal skeletons (kept in `traversal.rs`).

pub mod property;
pub mod traversal;

use crate::core::common::error::{Result, ThemisError};
use crate::core::keys;
use crate::core::kv::{LsmKvStore, WriteBatch};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// An edge record: `(from, to)` plus an optional type, weight (default
/// `1.0`), temporal validity window, and a free-form property bag used by
/// `aggregate_edge_property_in_time_range`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "_type")]
    pub edge_type: Option<String>,
    #[serde(rename = "_weight")]
    pub weight: Option<f64>,
    pub valid_from: Option<i64>,
    pub valid_to: Option<i64>,
    #[serde(default)]
    pub properties: Map<String, JsonValue>,
}

impl Edge {
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            edge_type: None,
            weight: None,
            valid_from: None,
            valid_to: None,
            properties: Map::new(),
        }
    }

    pub fn with_type(mut self, edge_type: impl Into<String>) -> Self {
        self.edge_type = Some(edge_type.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_validity(mut self, valid_from: Option<i64>, valid_to: Option<i64>) -> Self {
        self.valid_from = valid_from;
        self.valid_to = valid_to;
        self
    }

    pub fn cost(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    /// Looks up a named property: `weight`/`_weight` and `valid_from`/
    /// `valid_to` are addressable alongside the free-form property bag, so
    /// `aggregateEdgePropertyInTimeRange` can aggregate any of them by name.
    pub fn property_f64(&self, name: &str) -> Option<f64> {
        match name {
            "weight" | "_weight" => self.weight,
            "valid_from" => self.valid_from.map(|v| v as f64),
            "valid_to" => self.valid_to.map(|v| v as f64),
            other => self.properties.get(other).and_then(JsonValue::as_f64),
        }
    }
}

/// In-memory adjacency topology, loaded on demand by `rebuild_topology`
/// and maintained incrementally thereafter. Keyed by `(graph_id, node_pk)`
/// so multiple graphs can share one manager without cross-talk.
#[derive(Default)]
struct Topology {
    out: HashMap<(String, String), Vec<(String, String)>>,
    in_: HashMap<(String, String), Vec<(String, String)>>,
}

pub struct GraphIndexManager {
    store: Arc<LsmKvStore>,
    topology: Mutex<Option<Topology>>,
}

impl GraphIndexManager {
    pub fn new(store: Arc<LsmKvStore>) -> Self {
        Self { store, topology: Mutex::new(None) }
    }

    pub fn get_edge(&self, eid: &str) -> Result<Option<Edge>> {
        match self.store.get(&keys::edge_key(eid))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Emits the edge record and both adjacency directions (plus the
    /// type index, if typed) into `batch`. Callers share one batch across
    /// multiple edges via `add_edges_batch` for atomicity.
    fn emit_edge(&self, graph_id: &str, edge: &Edge, batch: &mut WriteBatch) -> Result<()> {
        batch.put(keys::edge_key(&edge.id), serde_json::to_vec(edge)?);
        batch.put(keys::adjacency_out_key(graph_id, &edge.from, &edge.id), edge.to.as_bytes().to_vec());
        batch.put(keys::adjacency_in_key(graph_id, &edge.to, &edge.id), edge.from.as_bytes().to_vec());
        if let Some(t) = &edge.edge_type {
            batch.put(keys::edge_type_key(graph_id, t, &edge.id), Vec::new());
        }
        Ok(())
    }

    pub fn add_edge(&self, graph_id: &str, edge: Edge) -> Result<()> {
        let mut batch = self.store.write_batch();
        self.emit_edge(graph_id, &edge, &mut batch)?;
        self.store.commit_batch(batch)?;
        self.maintain_topology_add(graph_id, &edge);
        debug!(graph_id, eid = %edge.id, from = %edge.from, to = %edge.to, "edge added");
        Ok(())
    }

    pub fn add_edges_batch(&self, graph_id: &str, edges: &[Edge]) -> Result<()> {
        let mut batch = self.store.write_batch();
        for edge in edges {
            self.emit_edge(graph_id, edge, &mut batch)?;
        }
        self.store.commit_batch(batch)?;
        for edge in edges {
            self.maintain_topology_add(graph_id, edge);
        }
        Ok(())
    }

    /// Deletes an edge and both adjacency entries in one batch. Deleting
    /// a missing edge is a no-op, matching the spec's idempotence
    /// requirement.
    pub fn delete_edge(&self, graph_id: &str, eid: &str) -> Result<()> {
        let Some(edge) = self.get_edge(eid)? else { return Ok(()) };
        let mut batch = self.store.write_batch();
        batch.delete(keys::edge_key(eid));
        batch.delete(keys::adjacency_out_key(graph_id, &edge.from, eid));
        batch.delete(keys::adjacency_in_key(graph_id, &edge.to, eid));
        if let Some(t) = &edge.edge_type {
            batch.delete(keys::edge_type_key(graph_id, t, eid));
        }
        self.store.commit_batch(batch)?;
        self.maintain_topology_remove(graph_id, &edge);
        Ok(())
    }

    pub fn out_neighbors(&self, graph_id: &str, from: &str) -> Result<Vec<String>> {
        Ok(self.out_adjacency(graph_id, from)?.into_iter().map(|(_, to)| to).collect())
    }

    pub fn in_neighbors(&self, graph_id: &str, to: &str) -> Result<Vec<String>> {
        Ok(self.in_adjacency(graph_id, to)?.into_iter().map(|(_, from)| from).collect())
    }

    /// Returns `(eid, target_pk)` pairs, so a caller can fetch edge
    /// properties without a second lookup by pk alone.
    pub fn out_adjacency(&self, graph_id: &str, from: &str) -> Result<Vec<(String, String)>> {
        if let Some(topology) = self.topology.lock()?.as_ref() {
            return Ok(topology.out.get(&(graph_id.to_string(), from.to_string())).cloned().unwrap_or_default());
        }
        let prefix = keys::adjacency_out_prefix(graph_id, from);
        let mut pairs = Vec::new();
        self.store.scan_prefix(&prefix, |k, v| {
            if let Some(eid) = k.strip_prefix(prefix.as_slice()) {
                pairs.push((String::from_utf8_lossy(eid).to_string(), String::from_utf8_lossy(v).to_string()));
            }
            true
        })?;
        Ok(pairs)
    }

    pub fn in_adjacency(&self, graph_id: &str, to: &str) -> Result<Vec<(String, String)>> {
        if let Some(topology) = self.topology.lock()?.as_ref() {
            return Ok(topology.in_.get(&(graph_id.to_string(), to.to_string())).cloned().unwrap_or_default());
        }
        let prefix = keys::adjacency_in_prefix(graph_id, to);
        let mut pairs = Vec::new();
        self.store.scan_prefix(&prefix, |k, v| {
            if let Some(eid) = k.strip_prefix(prefix.as_slice()) {
                pairs.push((String::from_utf8_lossy(eid).to_string(), String::from_utf8_lossy(v).to_string()));
            }
            true
        })?;
        Ok(pairs)
    }

    /// Loads every `graph:out:`/`graph:in:` entry for `graph_id` into the
    /// in-memory topology maps, protected by one mutex. Subsequent
    /// `add_edge`/`delete_edge` calls maintain it incrementally; readers
    /// transparently prefer it over prefix scans once loaded.
    pub fn rebuild_topology(&self, graph_id: &str) -> Result<()> {
        let mut out: HashMap<(String, String), Vec<(String, String)>> = HashMap::new();
        let mut in_: HashMap<(String, String), Vec<(String, String)>> = HashMap::new();

        let out_prefix = keys::graph_out_scan_prefix(graph_id);
        self.store.scan_prefix(&out_prefix, |k, v| {
            if let Some(rest) = k.strip_prefix(out_prefix.as_slice()) {
                if let Some(pos) = rest.iter().rposition(|&b| b == b':') {
                    let from = String::from_utf8_lossy(&rest[..pos]).to_string();
                    let eid = String::from_utf8_lossy(&rest[pos + 1..]).to_string();
                    let to = String::from_utf8_lossy(v).to_string();
                    out.entry((graph_id.to_string(), from)).or_default().push((eid, to));
                }
            }
            true
        })?;

        let in_prefix = keys::graph_in_scan_prefix(graph_id);
        self.store.scan_prefix(&in_prefix, |k, v| {
            if let Some(rest) = k.strip_prefix(in_prefix.as_slice()) {
                if let Some(pos) = rest.iter().rposition(|&b| b == b':') {
                    let to = String::from_utf8_lossy(&rest[..pos]).to_string();
                    let eid = String::from_utf8_lossy(&rest[pos + 1..]).to_string();
                    let from = String::from_utf8_lossy(v).to_string();
                    in_.entry((graph_id.to_string(), to)).or_default().push((eid, from));
                }
            }
            true
        })?;

        *self.topology.lock()? = Some(Topology { out, in_ });
        Ok(())
    }

    pub fn topology_loaded(&self) -> Result<bool> {
        Ok(self.topology.lock()?.is_some())
    }

    pub fn get_topology_node_count(&self) -> Result<Option<usize>> {
        let guard = self.topology.lock()?;
        Ok(guard.as_ref().map(|t| {
            let mut nodes: std::collections::HashSet<&(String, String)> = t.out.keys().collect();
            nodes.extend(t.in_.keys());
            nodes.len()
        }))
    }

    pub fn get_topology_edge_count(&self) -> Result<Option<usize>> {
        let guard = self.topology.lock()?;
        Ok(guard.as_ref().map(|t| t.out.values().map(Vec::len).sum()))
    }

    fn maintain_topology_add(&self, graph_id: &str, edge: &Edge) {
        if let Ok(mut guard) = self.topology.lock() {
            if let Some(topology) = guard.as_mut() {
                topology
                    .out
                    .entry((graph_id.to_string(), edge.from.clone()))
                    .or_default()
                    .push((edge.id.clone(), edge.to.clone()));
                topology
                    .in_
                    .entry((graph_id.to_string(), edge.to.clone()))
                    .or_default()
                    .push((edge.id.clone(), edge.from.clone()));
            }
        }
    }

    fn maintain_topology_remove(&self, graph_id: &str, edge: &Edge) {
        if let Ok(mut guard) = self.topology.lock() {
            if let Some(topology) = guard.as_mut() {
                if let Some(v) = topology.out.get_mut(&(graph_id.to_string(), edge.from.clone())) {
                    v.retain(|(eid, _)| eid != &edge.id);
                }
                if let Some(v) = topology.in_.get_mut(&(graph_id.to_string(), edge.to.clone())) {
                    v.retain(|(eid, _)| eid != &edge.id);
                }
            }
        }
    }

    pub(crate) fn store(&self) -> &Arc<LsmKvStore> {
        &self.store
    }
}

pub fn edge_missing(eid: &str) -> ThemisError {
    ThemisError::Graph(format!("edge missing: {eid}"))
}
