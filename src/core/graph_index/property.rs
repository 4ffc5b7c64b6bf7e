//! Property graph extension: node labels and edge types layered on the
//! same store as the adjacency index, plus federated queries across
//! multiple graph ids. Grounded on `core::graph::types::Node`/`Relationship`
//! for the label/type shape, adapted to the spec's `graph_id`-scoped
//! `node:`/`label:`/`type:` key families.

use super::GraphIndexManager;
use crate::core::common::error::Result;
use crate::core::keys;
use crate::core::kv::WriteBatch;
use std::collections::BTreeSet;

/// One pattern in a `federatedQuery`: resolve nodes carrying a label, or
/// edges carrying a type, within one graph.
pub enum FederatedPattern<'a> {
    NodesByLabel { graph_id: &'a str, label: &'a str },
    EdgesByType { graph_id: &'a str, edge_type: &'a str },
}

impl GraphIndexManager {
    /// Stores the node record (its label set, JSON-encoded) plus one
    /// `label:` entry per label, in one batch.
    pub fn add_node(&self, graph_id: &str, pk: &str, labels: &[String]) -> Result<()> {
        let mut batch = self.store().write_batch();
        self.emit_node(graph_id, pk, labels, &mut batch)?;
        self.store().commit_batch(batch)
    }

    pub fn add_nodes_batch(&self, graph_id: &str, nodes: &[(String, Vec<String>)]) -> Result<()> {
        let mut batch = self.store().write_batch();
        for (pk, labels) in nodes {
            self.emit_node(graph_id, pk, labels, &mut batch)?;
        }
        self.store().commit_batch(batch)
    }

    fn emit_node(&self, graph_id: &str, pk: &str, labels: &[String], batch: &mut WriteBatch) -> Result<()> {
        batch.put(keys::node_key(graph_id, pk), serde_json::to_vec(labels)?);
        for label in labels {
            batch.put(keys::label_key(graph_id, label, pk), Vec::new());
        }
        Ok(())
    }

    fn node_labels(&self, graph_id: &str, pk: &str) -> Result<Vec<String>> {
        match self.store().get(&keys::node_key(graph_id, pk))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn add_node_label(&self, graph_id: &str, pk: &str, label: &str) -> Result<()> {
        let mut labels = self.node_labels(graph_id, pk)?;
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
        let mut batch = self.store().write_batch();
        batch.put(keys::node_key(graph_id, pk), serde_json::to_vec(&labels)?);
        batch.put(keys::label_key(graph_id, label, pk), Vec::new());
        self.store().commit_batch(batch)
    }

    pub fn remove_node_label(&self, graph_id: &str, pk: &str, label: &str) -> Result<()> {
        let mut labels = self.node_labels(graph_id, pk)?;
        labels.retain(|l| l != label);
        let mut batch = self.store().write_batch();
        batch.put(keys::node_key(graph_id, pk), serde_json::to_vec(&labels)?);
        batch.delete(keys::label_key(graph_id, label, pk));
        self.store().commit_batch(batch)
    }

    pub fn get_nodes_by_label(&self, graph_id: &str, label: &str) -> Result<Vec<String>> {
        let prefix = keys::label_prefix(graph_id, label);
        let mut pks = Vec::new();
        self.store().scan_prefix(&prefix, |k, _| {
            if let Some(pk) = k.strip_prefix(prefix.as_slice()) {
                pks.push(String::from_utf8_lossy(pk).to_string());
            }
            true
        })?;
        Ok(pks)
    }

    pub fn get_edges_by_type(&self, graph_id: &str, edge_type: &str) -> Result<Vec<String>> {
        let prefix = keys::edge_type_prefix(graph_id, edge_type);
        let mut eids = Vec::new();
        self.store().scan_prefix(&prefix, |k, _| {
            if let Some(eid) = k.strip_prefix(prefix.as_slice()) {
                eids.push(String::from_utf8_lossy(eid).to_string());
            }
            true
        })?;
        Ok(eids)
    }

    /// Out-neighbors of `from` restricted to edges of `edge_type`.
    pub fn get_typed_out_edges(&self, graph_id: &str, from: &str, edge_type: &str) -> Result<Vec<(String, String)>> {
        let mut kept = Vec::new();
        for (eid, to) in self.out_adjacency(graph_id, from)? {
            if let Some(edge) = self.get_edge(&eid)? {
                if edge.edge_type.as_deref() == Some(edge_type) {
                    kept.push((eid, to));
                }
            }
        }
        Ok(kept)
    }

    /// Discovers distinct graph ids by scanning `node:` keys (the only
    /// family that names the graph id directly without requiring an edge
    /// to exist).
    pub fn list_graphs(&self) -> Result<Vec<String>> {
        let mut graphs = BTreeSet::new();
        self.store().scan_prefix(b"node:", |k, _| {
            if let Some(rest) = k.strip_prefix(b"node:".as_slice()) {
                if let Some(pos) = rest.iter().position(|&b| b == b':') {
                    graphs.insert(String::from_utf8_lossy(&rest[..pos]).to_string());
                }
            }
            true
        })?;
        Ok(graphs.into_iter().collect())
    }

    /// Resolves each pattern independently and concatenates the results,
    /// one `Vec<String>` per pattern in input order.
    pub fn federated_query(&self, patterns: &[FederatedPattern<'_>]) -> Result<Vec<Vec<String>>> {
        patterns
            .iter()
            .map(|p| match p {
                FederatedPattern::NodesByLabel { graph_id, label } => self.get_nodes_by_label(graph_id, label),
                FederatedPattern::EdgesByType { graph_id, edge_type } => self.get_edges_by_type(graph_id, edge_type),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::Edge;
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

    #[test]
    fn label_set_matches_nodes_by_label_query() {
        let (_dir, mgr) = setup();
        mgr.add_node("g1", "u1", &["Person".to_string(), "Admin".to_string()]).unwrap();
        mgr.add_node("g1", "u2", &["Person".to_string()]).unwrap();

        let mut admins = mgr.get_nodes_by_label("g1", "Admin").unwrap();
        admins.sort();
        assert_eq!(admins, vec!["u1".to_string()]);

        let mut people = mgr.get_nodes_by_label("g1", "Person").unwrap();
        people.sort();
        assert_eq!(people, vec!["u1".to_string(), "u2".to_string()]);
    }

    #[test]
    fn removing_a_label_removes_it_from_the_scan() {
        let (_dir, mgr) = setup();
        mgr.add_node("g1", "u1", &["Person".to_string()]).unwrap();
        mgr.remove_node_label("g1", "u1", "Person").unwrap();
        assert!(mgr.get_nodes_by_label("g1", "Person").unwrap().is_empty());
    }

    #[test]
    fn edges_by_type_and_typed_out_edges_agree() {
        let (_dir, mgr) = setup();
        mgr.add_edge("g1", Edge::new("e1", "a", "b").with_type("FOLLOWS")).unwrap();
        mgr.add_edge("g1", Edge::new("e2", "a", "c").with_type("LIKES")).unwrap();

        assert_eq!(mgr.get_edges_by_type("g1", "FOLLOWS").unwrap(), vec!["e1".to_string()]);
        assert_eq!(mgr.get_typed_out_edges("g1", "a", "FOLLOWS").unwrap(), vec![("e1".to_string(), "b".to_string())]);
    }

    #[test]
    fn list_graphs_discovers_distinct_graph_ids() {
        let (_dir, mgr) = setup();
        mgr.add_node("g1", "u1", &[]).unwrap();
        mgr.add_node("g2", "u1", &[]).unwrap();
        assert_eq!(mgr.list_graphs().unwrap(), vec!["g1".to_string(), "g2".to_string()]);
    }

    #[test]
    fn federated_query_concatenates_independent_patterns() {
        let (_dir, mgr) = setup();
        mgr.add_node("g1", "u1", &["Person".to_string()]).unwrap();
        mgr.add_edge("g1", Edge::new("e1", "u1", "u2").with_type("FOLLOWS")).unwrap();

        let results = mgr
            .federated_query(&[
                FederatedPattern::NodesByLabel { graph_id: "g1", label: "Person" },
                FederatedPattern::EdgesByType { graph_id: "g1", edge_type: "FOLLOWS" },
            ])
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], vec!["u1".to_string()]);
        assert_eq!(results[1], vec!["e1".to_string()]);
    }
}
