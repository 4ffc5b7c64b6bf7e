//! Vector Index Manager: approximate-nearest-neighbor search over
//! per-entity float vectors with per-object configuration, grounded on
//! `core::indexing::hnsw::tree::HnswIndex` for the insert/search dispatch
//! shape and persistence layout, generalized to the spec's
//! `init`/`addEntity`/`searchKnn` lifecycle and whitelist-prefiltering
//! retry logic.

pub mod distance;
pub mod hnsw;

use crate::core::common::error::{Result, ThemisError};
use crate::core::common::types::Value;
use crate::core::entity::Entity;
use crate::core::kv::{LsmKvStore, VectorPrefilterConfig};
use crate::core::keys;
use distance::Metric;
use hnsw::{HnswGraph, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorIndexMeta {
    object_name: String,
    dim: usize,
    metric: Metric,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
}

struct ObjectIndex {
    meta: VectorIndexMeta,
    graph: HnswGraph,
    pk_to_id: HashMap<String, NodeId>,
    id_to_pk: HashMap<NodeId, String>,
    cache: HashMap<String, Vec<f32>>,
    prefilter: VectorPrefilterConfig,
}

/// One scored search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub pk: String,
    pub distance: f32,
}

pub struct VectorIndexManager {
    store: Arc<LsmKvStore>,
    objects: Mutex<HashMap<String, ObjectIndex>>,
}

impl VectorIndexManager {
    pub fn new(store: Arc<LsmKvStore>) -> Self {
        Self { store, objects: Mutex::new(HashMap::new()) }
    }

    /// Registers one index family, persisting its parameters to the store
    /// so a fresh `VectorIndexManager` can restore them on reopen via
    /// `load_index`. Calling `init` again for the same object resets it.
    pub fn init(
        &self,
        object_name: &str,
        dim: usize,
        metric: Metric,
        m: usize,
        ef_construction: usize,
        ef_search: usize,
    ) -> Result<()> {
        let meta = VectorIndexMeta { object_name: object_name.to_string(), dim, metric, m, ef_construction, ef_search };
        self.store.put(keys::vector_config_key(object_name), serde_json::to_vec(&meta)?)?;
        let mut objects = self.objects.lock()?;
        objects.insert(
            object_name.to_string(),
            ObjectIndex {
                graph: HnswGraph::new(metric, dim, m, ef_construction),
                meta,
                pk_to_id: HashMap::new(),
                id_to_pk: HashMap::new(),
                cache: HashMap::new(),
                prefilter: VectorPrefilterConfig::default(),
            },
        );
        Ok(())
    }

    pub fn set_prefilter_config(&self, object_name: &str, config: VectorPrefilterConfig) -> Result<()> {
        let mut objects = self.objects.lock()?;
        let obj = objects.get_mut(object_name).ok_or_else(|| not_initialized(object_name))?;
        obj.prefilter = config;
        Ok(())
    }

    pub fn set_ef_search(&self, object_name: &str, ef_search: usize) -> Result<()> {
        let mut objects = self.objects.lock()?;
        let obj = objects.get_mut(object_name).ok_or_else(|| not_initialized(object_name))?;
        obj.meta.ef_search = ef_search;
        self.store.put(keys::vector_config_key(object_name), serde_json::to_vec(&obj.meta)?)?;
        Ok(())
    }

    fn extract_vector(entity: &Entity, vector_field: &str, dim: usize) -> Result<Vec<f32>> {
        match entity.get(vector_field) {
            Some(Value::Vector(v)) => {
                if v.len() != dim {
                    return Err(ThemisError::DimensionMismatch { expected: dim, actual: v.len() });
                }
                Ok(v)
            }
            _ => Err(ThemisError::InvalidInput(format!("field {vector_field} is not a vector"))),
        }
    }

    /// Serializes `entity` to its primary key, normalizes its vector field
    /// per the object's metric, and inserts it into the HNSW graph. If the
    /// pk already exists, the old entry is tombstoned first so this also
    /// implements `updateEntity` as remove+add in one batch.
    pub fn add_entity(&self, object_name: &str, entity: &Entity, vector_field: &str) -> Result<()> {
        let mut objects = self.objects.lock()?;
        let obj = objects.get_mut(object_name).ok_or_else(|| not_initialized(object_name))?;
        let raw = Self::extract_vector(entity, vector_field, obj.meta.dim)?;
        let prepared = obj.meta.metric.prepare(&raw);

        if let Some(&old_id) = obj.pk_to_id.get(entity.pk()) {
            obj.graph.mark_deleted(old_id);
        }

        let id = obj.graph.insert(prepared.clone());
        obj.pk_to_id.insert(entity.pk().to_string(), id);
        obj.id_to_pk.insert(id, entity.pk().to_string());
        obj.cache.insert(entity.pk().to_string(), prepared);

        self.store.put(keys::vector_object_key(object_name, entity.pk()), entity.to_bytes()?)?;
        debug!(object_name, pk = entity.pk(), "vector entity indexed");
        Ok(())
    }

    pub fn add_entity_batch(&self, object_name: &str, entities: &[Entity], vector_field: &str) -> Result<()> {
        for entity in entities {
            self.add_entity(object_name, entity, vector_field)?;
        }
        Ok(())
    }

    pub fn update_entity(&self, object_name: &str, entity: &Entity, vector_field: &str) -> Result<()> {
        self.add_entity(object_name, entity, vector_field)
    }

    /// Deletes the primary record and tombstones the HNSW id; the cache
    /// entry is removed so brute-force fallback no longer sees it.
    pub fn remove_by_pk(&self, object_name: &str, pk: &str) -> Result<()> {
        let mut objects = self.objects.lock()?;
        let obj = objects.get_mut(object_name).ok_or_else(|| not_initialized(object_name))?;
        if let Some(id) = obj.pk_to_id.remove(pk) {
            obj.graph.mark_deleted(id);
            obj.id_to_pk.remove(&id);
        }
        obj.cache.remove(pk);
        self.store.delete(&keys::vector_object_key(object_name, pk))?;
        Ok(())
    }

    pub fn get_entity(&self, object_name: &str, pk: &str) -> Result<Option<Entity>> {
        match self.store.get(&keys::vector_object_key(object_name, pk))? {
            Some(bytes) => Ok(Some(Entity::from_bytes(pk, &bytes)?)),
            None => Ok(None),
        }
    }

    fn brute_force(
        obj: &ObjectIndex,
        query: &[f32],
        k: usize,
        whitelist: Option<&HashSet<String>>,
    ) -> Vec<VectorHit> {
        let mut scored: Vec<VectorHit> = obj
            .cache
            .iter()
            .filter(|(pk, _)| whitelist.map(|w| w.contains(pk.as_str())).unwrap_or(true))
            .map(|(pk, v)| VectorHit { pk: pk.clone(), distance: obj.meta.metric.distance(query, v) })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        scored
    }

    /// `searchKnn(query, k, whitelist?)` per the spec's iterative
    /// whitelist-prefiltering algorithm: grows `ef`/candidate count by
    /// `whitelist_growth_factor` up to `whitelist_max_attempts` times
    /// before falling back to a brute-force scan restricted to the
    /// whitelist.
    pub fn search_knn(&self, object_name: &str, query: &[f32], k: usize, whitelist: Option<&HashSet<String>>) -> Result<Vec<VectorHit>> {
        let objects = self.objects.lock()?;
        let obj = objects.get(object_name).ok_or_else(|| not_initialized(object_name))?;
        if query.len() != obj.meta.dim {
            return Err(ThemisError::DimensionMismatch { expected: obj.meta.dim, actual: query.len() });
        }
        let prepared = obj.meta.metric.prepare(query);

        if obj.graph.is_empty() {
            return Ok(Self::brute_force(obj, &prepared, k, whitelist));
        }

        let Some(whitelist) = whitelist else {
            return Ok(obj
                .graph
                .search(&prepared, obj.meta.ef_search.max(k))
                .into_iter()
                .filter_map(|(id, d)| obj.id_to_pk.get(&id).map(|pk| VectorHit { pk: pk.clone(), distance: d }))
                .take(k)
                .collect());
        };

        if whitelist.is_empty() {
            return Ok(Vec::new());
        }

        let mut ef = ((k as f64) * obj.prefilter.whitelist_initial_factor).ceil() as usize;
        let mut attempt = 0;
        loop {
            let candidates = obj.graph.search(&prepared, ef.max(k));
            let hits: Vec<VectorHit> = candidates
                .into_iter()
                .filter_map(|(id, d)| obj.id_to_pk.get(&id).map(|pk| (pk.clone(), d)))
                .filter(|(pk, _)| whitelist.contains(pk))
                .map(|(pk, distance)| VectorHit { pk, distance })
                .collect();

            if hits.len() >= obj.prefilter.whitelist_min_candidates.max(k.min(whitelist.len())) || attempt >= obj.prefilter.whitelist_max_attempts {
                if hits.len() >= k || attempt >= obj.prefilter.whitelist_max_attempts {
                    let mut hits = hits;
                    hits.truncate(k);
                    if hits.len() < k {
                        warn!(object_name, "HNSW whitelist prefiltering exhausted, falling back to brute force");
                        return Ok(Self::brute_force(obj, &prepared, k, Some(whitelist)));
                    }
                    return Ok(hits);
                }
            }
            attempt += 1;
            ef = ((ef as f64) * obj.prefilter.whitelist_growth_factor).ceil() as usize;
        }
    }

    /// Resolves `attr_filters` (column, value) pairs to matching pks via
    /// `resolve_eq`, intersects them into one whitelist, then delegates to
    /// `search_knn`. `resolve_eq` is supplied by the caller (the top-level
    /// facade that also owns the secondary index manager) so this module
    /// stays decoupled from `secondary_index`.
    pub fn search_knn_filtered(
        &self,
        object_name: &str,
        query: &[f32],
        k: usize,
        attr_filters: &[(&str, &str)],
        resolve_eq: impl Fn(&str, &str) -> Result<Vec<String>>,
    ) -> Result<Vec<VectorHit>> {
        if attr_filters.is_empty() {
            return self.search_knn(object_name, query, k, None);
        }
        let mut whitelist: Option<HashSet<String>> = None;
        for (col, value) in attr_filters {
            let matches: HashSet<String> = resolve_eq(col, value)?.into_iter().collect();
            whitelist = Some(match whitelist {
                Some(existing) => existing.intersection(&matches).cloned().collect(),
                None => matches,
            });
        }
        let whitelist = whitelist.unwrap_or_default();
        self.search_knn(object_name, query, k, Some(&whitelist))
    }

    /// Writes `meta.txt` (index parameters), `labels.txt` (one pk per
    /// line, line number = HNSW internal id), and `index.bin` (the HNSW
    /// graph, JSON-encoded — "`.bin`" names the artifact, not a literal
    /// binary format, matching this crate's serde_json-everywhere
    /// persistence convention).
    pub fn save_index(&self, object_name: &str, dir: &Path) -> Result<()> {
        let objects = self.objects.lock()?;
        let obj = objects.get(object_name).ok_or_else(|| not_initialized(object_name))?;
        fs::create_dir_all(dir)?;
        fs::write(dir.join("meta.txt"), serde_json::to_vec(&obj.meta)?)?;

        let mut labels = String::new();
        let mut max_id = 0;
        for (&id, pk) in &obj.id_to_pk {
            max_id = max_id.max(id);
            labels.push_str(pk);
            labels.push('\n');
        }
        let _ = max_id;
        fs::write(dir.join("labels.txt"), labels)?;
        fs::write(dir.join("index.bin"), serde_json::to_vec(&obj.graph)?)?;
        Ok(())
    }

    /// Restores a previously `init`-ed object's graph, labels, and cache
    /// from `save_index`'s output. The object must already be registered
    /// (via `init`) with matching dim/metric before loading.
    pub fn load_index(&self, object_name: &str, dir: &Path) -> Result<()> {
        let meta_bytes = fs::read(dir.join("meta.txt"))?;
        let meta: VectorIndexMeta = serde_json::from_slice(&meta_bytes)?;
        if meta.object_name != object_name {
            return Err(ThemisError::InvalidInput(format!(
                "index directory holds object '{}', expected '{object_name}'",
                meta.object_name
            )));
        }

        let graph_bytes = fs::read(dir.join("index.bin"))?;
        let graph: HnswGraph = serde_json::from_slice(&graph_bytes)?;
        if graph.dim() != meta.dim {
            return Err(ThemisError::DimensionMismatch { expected: meta.dim, actual: graph.dim() });
        }

        let labels_text = fs::read_to_string(dir.join("labels.txt"))?;
        let mut id_to_pk = HashMap::new();
        let mut pk_to_id = HashMap::new();
        for (id, pk) in labels_text.lines().enumerate() {
            if pk.is_empty() {
                continue;
            }
            id_to_pk.insert(id, pk.to_string());
            pk_to_id.insert(pk.to_string(), id);
        }

        let mut cache = HashMap::new();
        for pk in id_to_pk.values() {
            if let Some(entity) = self.get_entity(object_name, pk)? {
                if let Ok(raw) = Self::extract_vector(&entity, "embedding", meta.dim) {
                    cache.insert(pk.clone(), meta.metric.prepare(&raw));
                }
            }
        }

        let mut objects = self.objects.lock()?;
        if let Some(configured_metric) = objects.get(object_name).map(|o| o.meta.metric) {
            if configured_metric != meta.metric {
                return Err(ThemisError::MetricMismatch {
                    expected: configured_metric.as_str().to_string(),
                    actual: meta.metric.as_str().to_string(),
                });
            }
        }
        objects.insert(
            object_name.to_string(),
            ObjectIndex { meta, graph, pk_to_id, id_to_pk, cache, prefilter: VectorPrefilterConfig::default() },
        );
        Ok(())
    }

    /// Repopulates the index from the primary `<objectName>:` table alone
    /// (e.g. after a corrupted `index.bin`), re-inserting every stored
    /// entity's `vector_field`.
    pub fn rebuild_from_storage(&self, object_name: &str, vector_field: &str) -> Result<()> {
        let (dim, metric, m, ef_construction, ef_search) = {
            let objects = self.objects.lock()?;
            let obj = objects.get(object_name).ok_or_else(|| not_initialized(object_name))?;
            (obj.meta.dim, obj.meta.metric, obj.meta.m, obj.meta.ef_construction, obj.meta.ef_search)
        };
        self.init(object_name, dim, metric, m, ef_construction, ef_search)?;

        let prefix = keys::vector_object_prefix(object_name);
        let mut entities = Vec::new();
        self.store.scan_prefix(&prefix, |k, v| {
            if let Some(pk) = k.strip_prefix(prefix.as_slice()) {
                let pk = String::from_utf8_lossy(pk).to_string();
                if let Ok(entity) = Entity::from_bytes(&pk, v) {
                    entities.push(entity);
                }
            }
            true
        })?;
        for entity in &entities {
            self.add_entity(object_name, entity, vector_field)?;
        }
        Ok(())
    }
}

fn not_initialized(object_name: &str) -> ThemisError {
    ThemisError::Vector(format!("vector object '{object_name}' was not initialized"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::StoreConfig;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, VectorIndexManager) {
        let dir = TempDir::new().unwrap();
        let store =
            Arc::new(LsmKvStore::open(StoreConfig { db_path: dir.path().to_path_buf(), ..Default::default() }).unwrap());
        (dir, VectorIndexManager::new(store))
    }

    fn entity_with_vector(pk: &str, v: Vec<f32>) -> Entity {
        let mut e = Entity::new(pk).unwrap();
        e.set("embedding", Value::Vector(v));
        e
    }

    #[test]
    fn search_knn_cosine_ranks_nearest_neighbor_first() {
        let (_dir, mgr) = setup();
        mgr.init("docs", 3, Metric::Cosine, 16, 64, 64).unwrap();
        mgr.add_entity("docs", &entity_with_vector("doc1", vec![1.0, 0.0, 0.0]), "embedding").unwrap();
        mgr.add_entity("docs", &entity_with_vector("doc2", vec![0.0, 1.0, 0.0]), "embedding").unwrap();
        mgr.add_entity("docs", &entity_with_vector("doc3", vec![0.9, 0.1, 0.0]), "embedding").unwrap();

        let hits = mgr.search_knn("docs", &[1.0, 0.0, 0.0], 2, None).unwrap();
        let pks: Vec<&str> = hits.iter().map(|h| h.pk.as_str()).collect();
        assert_eq!(pks[0], "doc1");
        assert!(pks.contains(&"doc3"));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let (_dir, mgr) = setup();
        mgr.init("docs", 3, Metric::L2, 16, 64, 64).unwrap();
        let err = mgr.add_entity("docs", &entity_with_vector("doc1", vec![1.0, 0.0]), "embedding").unwrap_err();
        assert!(matches!(err, ThemisError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn remove_by_pk_excludes_it_from_later_searches() {
        let (_dir, mgr) = setup();
        mgr.init("docs", 2, Metric::L2, 16, 64, 64).unwrap();
        mgr.add_entity("docs", &entity_with_vector("a", vec![0.0, 0.0]), "embedding").unwrap();
        mgr.add_entity("docs", &entity_with_vector("b", vec![1.0, 1.0]), "embedding").unwrap();
        mgr.remove_by_pk("docs", "a").unwrap();

        let hits = mgr.search_knn("docs", &[0.0, 0.0], 5, None).unwrap();
        assert!(hits.iter().all(|h| h.pk != "a"));
        assert!(mgr.get_entity("docs", "a").unwrap().is_none());
    }

    #[test]
    fn search_knn_with_whitelist_only_returns_whitelisted_pks() {
        let (_dir, mgr) = setup();
        mgr.init("docs", 2, Metric::L2, 16, 64, 64).unwrap();
        mgr.add_entity("docs", &entity_with_vector("a", vec![0.0, 0.0]), "embedding").unwrap();
        mgr.add_entity("docs", &entity_with_vector("b", vec![0.1, 0.1]), "embedding").unwrap();
        mgr.add_entity("docs", &entity_with_vector("c", vec![5.0, 5.0]), "embedding").unwrap();

        let whitelist: HashSet<String> = ["b", "c"].into_iter().map(String::from).collect();
        let hits = mgr.search_knn("docs", &[0.0, 0.0], 2, Some(&whitelist)).unwrap();
        assert!(hits.iter().all(|h| h.pk != "a"));
        assert_eq!(hits[0].pk, "b");
    }

    #[test]
    fn save_and_load_index_round_trips_search_results() {
        let (_dir, mgr) = setup();
        let artifact_dir = TempDir::new().unwrap();
        mgr.init("docs", 2, Metric::L2, 16, 64, 64).unwrap();
        mgr.add_entity("docs", &entity_with_vector("a", vec![1.0, 2.0]), "embedding").unwrap();
        mgr.save_index("docs", artifact_dir.path()).unwrap();

        let (_dir2, mgr2) = setup();
        mgr2.init("docs", 2, Metric::L2, 16, 64, 64).unwrap();
        mgr2.load_index("docs", artifact_dir.path()).unwrap();
        let hits = mgr2.search_knn("docs", &[1.0, 2.0], 1, None).unwrap();
        assert_eq!(hits[0].pk, "a");
        assert_relative_eq!(hits[0].distance, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn load_index_rejects_a_metric_disagreeing_with_the_configured_object() {
        let (_dir, mgr) = setup();
        let artifact_dir = TempDir::new().unwrap();
        mgr.init("docs", 2, Metric::L2, 16, 64, 64).unwrap();
        mgr.add_entity("docs", &entity_with_vector("a", vec![1.0, 2.0]), "embedding").unwrap();
        mgr.save_index("docs", artifact_dir.path()).unwrap();

        let (_dir2, mgr2) = setup();
        mgr2.init("docs", 2, Metric::Cosine, 16, 64, 64).unwrap();
        let err = mgr2.load_index("docs", artifact_dir.path()).unwrap_err();
        assert!(matches!(err, ThemisError::MetricMismatch { .. }));
    }

    #[test]
    fn rebuild_from_storage_reinserts_every_stored_entity() {
        let (_dir, mgr) = setup();
        mgr.init("docs", 2, Metric::L2, 16, 64, 64).unwrap();
        mgr.add_entity("docs", &entity_with_vector("a", vec![1.0, 1.0]), "embedding").unwrap();
        mgr.add_entity("docs", &entity_with_vector("b", vec![2.0, 2.0]), "embedding").unwrap();

        mgr.rebuild_from_storage("docs", "embedding").unwrap();
        let hits = mgr.search_knn("docs", &[1.0, 1.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
    }
}
