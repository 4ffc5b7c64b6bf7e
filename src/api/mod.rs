//! Public facade: one `Database` handle that owns the KV store and every
//! manager layered on top of it, wiring entity writes through the
//! transaction coordinator so callers never have to assemble a batch
//! themselves. Grounded on `core::kv::store::LsmKvStore::open`'s
//! single-directory-handle shape — `Database::open` is the crate's front
//! door the way `LsmKvStore::open` is the store's.

use crate::core::changefeed::{ChangeEvent, ChangefeedManager, ChangefeedStats, EventType};
use crate::core::common::error::Result;
use crate::core::common::types::Value;
use crate::core::entity::Entity;
use crate::core::graph_index::property::FederatedPattern;
use crate::core::graph_index::traversal::{AggregateOp, TemporalStats};
use crate::core::graph_index::{Edge, GraphIndexManager};
use crate::core::keys;
use crate::core::kv::config::{FulltextConfig, VectorPrefilterConfig};
use crate::core::kv::{LsmKvStore, StoreConfig};
use crate::core::secondary_index::meta::{IndexKind, IndexMeta, IndexStats};
use crate::core::secondary_index::SecondaryIndexManager;
use crate::core::txn_coordinator::TxnCoordinator;
use crate::core::vector_index::distance::Metric;
use crate::core::vector_index::{VectorHit, VectorIndexManager};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// The top-level handle onto one indexing core: one on-disk store backing
/// entities, secondary indexes, the graph index, the vector index, and the
/// changefeed, plus the coordinator that keeps an entity write and its
/// index/CDC maintenance atomic.
pub struct Database {
    store: Arc<LsmKvStore>,
    indexes: Arc<SecondaryIndexManager>,
    graph: Arc<GraphIndexManager>,
    vectors: Arc<VectorIndexManager>,
    changefeed: Arc<ChangefeedManager>,
    coordinator: TxnCoordinator,
}

impl Database {
    /// Opens (creating if absent) the store at `config.db_path` and wires
    /// up every manager against it.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Arc::new(LsmKvStore::open(config)?);
        let indexes = Arc::new(SecondaryIndexManager::new(store.clone()));
        let graph = Arc::new(GraphIndexManager::new(store.clone()));
        let vectors = Arc::new(VectorIndexManager::new(store.clone()));
        let changefeed = Arc::new(ChangefeedManager::new(store.clone()));
        let coordinator = TxnCoordinator::new(store.clone(), indexes.clone(), changefeed.clone());
        Ok(Self { store, indexes, graph, vectors, changefeed, coordinator })
    }

    pub fn close(&self) -> Result<()> {
        self.store.close()
    }

    // --- Entities (§4.1, §4.6) ---

    /// Writes `entity` into `table`, maintaining every declared index and
    /// appending one changefeed event atomically. Returns the allocated
    /// changefeed sequence number. Retries on `ThemisError::ConflictRetryable`
    /// are the caller's responsibility.
    pub fn put_entity(&self, table: &str, entity: &Entity) -> Result<u64> {
        self.coordinator.put_entity(table, entity)
    }

    pub fn get_entity(&self, table: &str, pk: &str) -> Result<Option<Entity>> {
        match self.store.get(&keys::primary_key(table, pk))? {
            Some(bytes) => Ok(Some(Entity::from_bytes(pk, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Deletes the entity at `pk` in `table`. Returns `None` if it did not
    /// exist; otherwise the allocated changefeed sequence number.
    pub fn erase_entity(&self, table: &str, pk: &str) -> Result<Option<u64>> {
        self.coordinator.erase_entity(table, pk)
    }

    // --- Secondary indexes (§4.2) ---

    #[allow(clippy::too_many_arguments)]
    pub fn declare_index(
        &self,
        table: &str,
        columns: &[&str],
        kind: IndexKind,
        unique: bool,
        ttl_seconds: Option<u64>,
        fulltext: Option<FulltextConfig>,
        geo_precision_bits: Option<u32>,
    ) -> Result<()> {
        self.indexes.declare_index(table, columns, kind, unique, ttl_seconds, fulltext, geo_precision_bits)
    }

    pub fn drop_index(&self, table: &str, columns: &[&str]) -> Result<()> {
        self.indexes.drop_index(table, columns)
    }

    pub fn get_index_meta(&self, table: &str, columns: &[&str]) -> Result<Option<IndexMeta>> {
        self.indexes.get_meta(table, columns)
    }

    pub fn get_index_stats(&self, table: &str, columns: &[&str]) -> Result<IndexStats> {
        self.indexes.get_index_stats(table, columns)
    }

    pub fn scan_equal(&self, table: &str, col: &str, value: &str) -> Result<Vec<String>> {
        self.indexes.scan_keys_equal(table, col, value)
    }

    pub fn scan_equal_composite(&self, table: &str, columns: &[&str], values: &[&str]) -> Result<Vec<String>> {
        self.indexes.scan_keys_equal_composite(table, columns, values)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn scan_range(
        &self,
        table: &str,
        col: &str,
        lo: Option<&Value>,
        hi: Option<&Value>,
        lo_inclusive: bool,
        hi_inclusive: bool,
        limit: usize,
        reverse: bool,
    ) -> Result<Vec<String>> {
        self.indexes.scan_keys_range(table, col, lo, hi, lo_inclusive, hi_inclusive, limit, reverse)
    }

    pub fn scan_geo_box(&self, table: &str, col: &str, min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64, precision_bits: u32) -> Result<Vec<String>> {
        self.indexes.scan_geo_box(table, col, min_lat, min_lon, max_lat, max_lon, precision_bits)
    }

    pub fn scan_geo_radius(&self, table: &str, col: &str, lat: f64, lon: f64, radius_km: f64, precision_bits: u32) -> Result<Vec<String>> {
        self.indexes.scan_geo_radius(table, col, lat, lon, radius_km, precision_bits)
    }

    pub fn scan_fulltext(&self, table: &str, col: &str, query: &str, cfg: &FulltextConfig) -> Result<Vec<String>> {
        self.indexes.scan_fulltext(table, col, query, cfg)
    }

    pub fn cleanup_expired_entities(&self, table: &str, col: &str) -> Result<u64> {
        self.indexes.cleanup_expired_entities(table, col)
    }

    pub fn reindex_table(&self, table: &str) -> Result<()> {
        self.indexes.reindex_table(table)
    }

    // --- Graph index (§4.3) and property graph (§4.3 extension) ---

    pub fn add_edge(&self, graph_id: &str, edge: Edge) -> Result<()> {
        self.graph.add_edge(graph_id, edge)
    }

    pub fn delete_edge(&self, graph_id: &str, eid: &str) -> Result<()> {
        self.graph.delete_edge(graph_id, eid)
    }

    pub fn out_neighbors(&self, graph_id: &str, from: &str) -> Result<Vec<String>> {
        self.graph.out_neighbors(graph_id, from)
    }

    pub fn in_neighbors(&self, graph_id: &str, to: &str) -> Result<Vec<String>> {
        self.graph.in_neighbors(graph_id, to)
    }

    pub fn bfs(&self, graph_id: &str, start: &str, max_depth: usize, type_filter: Option<&str>) -> Result<Vec<String>> {
        self.graph.bfs(graph_id, start, max_depth, type_filter)
    }

    pub fn dijkstra(&self, graph_id: &str, start: &str, target: &str, type_filter: Option<&str>) -> Result<Option<(Vec<String>, f64)>> {
        self.graph.dijkstra(graph_id, start, target, type_filter)
    }

    /// A* shortest path; a heuristic returning `0.0` everywhere degenerates
    /// to Dijkstra.
    pub fn a_star(
        &self,
        graph_id: &str,
        start: &str,
        target: &str,
        heuristic: impl Fn(&str) -> f64,
        type_filter: Option<&str>,
    ) -> Result<Option<(Vec<String>, f64)>> {
        self.graph.a_star(graph_id, start, target, heuristic, type_filter)
    }

    pub fn add_node(&self, graph_id: &str, pk: &str, labels: &[String]) -> Result<()> {
        self.graph.add_node(graph_id, pk, labels)
    }

    pub fn get_nodes_by_label(&self, graph_id: &str, label: &str) -> Result<Vec<String>> {
        self.graph.get_nodes_by_label(graph_id, label)
    }

    pub fn get_edges_by_type(&self, graph_id: &str, edge_type: &str) -> Result<Vec<String>> {
        self.graph.get_edges_by_type(graph_id, edge_type)
    }

    pub fn federated_query(&self, patterns: &[FederatedPattern<'_>]) -> Result<Vec<Vec<String>>> {
        self.graph.federated_query(patterns)
    }

    pub fn get_temporal_stats(&self, lo: i64, hi: i64, fully_contained: bool) -> Result<TemporalStats> {
        self.graph.get_temporal_stats(lo, hi, fully_contained)
    }

    pub fn aggregate_edge_property(
        &self,
        prop: &str,
        op: AggregateOp,
        lo: i64,
        hi: i64,
        fully_contained: bool,
        type_filter: Option<&str>,
    ) -> Result<f64> {
        self.graph.aggregate_edge_property_in_time_range(prop, op, lo, hi, fully_contained, type_filter)
    }

    // --- Vector index (§4.4) ---

    #[allow(clippy::too_many_arguments)]
    pub fn init_vector_object(&self, object_name: &str, dim: usize, metric: Metric, m: usize, ef_construction: usize, ef_search: usize) -> Result<()> {
        self.vectors.init(object_name, dim, metric, m, ef_construction, ef_search)
    }

    pub fn set_vector_prefilter_config(&self, object_name: &str, cfg: VectorPrefilterConfig) -> Result<()> {
        self.vectors.set_prefilter_config(object_name, cfg)
    }

    pub fn set_ef_search(&self, object_name: &str, ef_search: usize) -> Result<()> {
        self.vectors.set_ef_search(object_name, ef_search)
    }

    pub fn add_vector_entity(&self, object_name: &str, entity: &Entity, vector_field: &str) -> Result<()> {
        self.vectors.add_entity(object_name, entity, vector_field)
    }

    pub fn remove_vector_entity(&self, object_name: &str, pk: &str) -> Result<()> {
        self.vectors.remove_by_pk(object_name, pk)
    }

    pub fn search_knn(&self, object_name: &str, query: &[f32], k: usize, whitelist: Option<&HashSet<String>>) -> Result<Vec<VectorHit>> {
        self.vectors.search_knn(object_name, query, k, whitelist)
    }

    pub fn save_vector_index(&self, object_name: &str, dir: &Path) -> Result<()> {
        self.vectors.save_index(object_name, dir)
    }

    pub fn load_vector_index(&self, object_name: &str, dir: &Path) -> Result<()> {
        self.vectors.load_index(object_name, dir)
    }

    // --- Changefeed (§4.5) ---

    pub fn list_change_events(
        &self,
        from_seq: u64,
        limit: usize,
        key_prefix: Option<&str>,
        type_filter: Option<EventType>,
        long_poll_ms: u64,
    ) -> Result<Vec<ChangeEvent>> {
        self.changefeed.list_events(from_seq, limit, key_prefix, type_filter, long_poll_ms)
    }

    pub fn latest_change_sequence(&self) -> Result<u64> {
        self.changefeed.get_latest_sequence()
    }

    pub fn changefeed_stats(&self) -> Result<ChangefeedStats> {
        self.changefeed.get_stats()
    }

    // --- Checkpoints (§8) ---

    pub fn create_checkpoint(&self, dest_dir: &Path) -> Result<()> {
        self.store.create_checkpoint(dest_dir)
    }

    pub fn restore_from_checkpoint(&self, checkpoint_dir: &Path) -> Result<()> {
        self.store.restore_from_checkpoint(checkpoint_dir)
    }

    // --- Raw manager access for callers building cross-manager features,
    //     e.g. resolving a vector search whitelist from a secondary index
    //     scan via `VectorIndexManager::search_knn_filtered`. ---

    pub fn store(&self) -> &Arc<LsmKvStore> {
        &self.store
    }

    pub fn indexes(&self) -> &Arc<SecondaryIndexManager> {
        &self.indexes
    }

    pub fn graph(&self) -> &Arc<GraphIndexManager> {
        &self.graph
    }

    pub fn vectors(&self) -> &Arc<VectorIndexManager> {
        &self.vectors
    }

    pub fn changefeed(&self) -> &Arc<ChangefeedManager> {
        &self.changefeed
    }
}
