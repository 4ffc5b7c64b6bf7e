//! Secondary Index Manager: seven index flavors over `(table, column)` or
//! `(table, [columns])`, sharing one write path and one metadata family.
//! Grounded on `core::indexing::manager::IndexManager`'s
//! declare/create/maintain shape, generalized from "one scalar or vector
//! index per name" to "one of seven flavors per declared (table, columns)".

pub mod fulltext;
pub mod geo;
pub mod meta;

use crate::core::common::error::{Result, ThemisError};
use crate::core::entity::Entity;
use crate::core::keys;
use crate::core::kv::config::FulltextConfig;
use crate::core::kv::{LsmKvStore, WriteBatch};
use meta::{IndexKind, IndexMeta, IndexStats};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

pub struct SecondaryIndexManager {
    store: Arc<LsmKvStore>,
}

fn now_epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Splits a `gidx:table:col:<geohash>:<pk>` key into `(geohash, pk)` given
/// the byte length of the fixed `gidx:table:col:` prefix.
fn split_geo_key(key: &[u8], fixed_prefix_len: usize) -> Option<(String, String)> {
    let rest = key.get(fixed_prefix_len..)?;
    let pos = rest.iter().position(|&b| b == b':')?;
    let hash = String::from_utf8_lossy(&rest[..pos]).to_string();
    let pk = String::from_utf8_lossy(&rest[pos + 1..]).to_string();
    Some((hash, pk))
}

impl SecondaryIndexManager {
    pub fn new(store: Arc<LsmKvStore>) -> Self {
        Self { store }
    }

    fn meta_name(columns: &[&str]) -> String {
        columns.join("+")
    }

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
        if columns.is_empty() {
            return Err(ThemisError::InvalidInput("index must declare at least one column".to_string()));
        }
        if kind != IndexKind::Composite && columns.len() != 1 {
            return Err(ThemisError::InvalidInput(format!(
                "index kind {kind:?} takes exactly one column"
            )));
        }
        let meta = IndexMeta {
            kind,
            unique,
            columns: columns.iter().map(|s| s.to_string()).collect(),
            ttl_seconds,
            fulltext,
            geo_precision_bits,
        };
        let key = keys::index_meta_key(table, &Self::meta_name(columns));
        let value = serde_json::to_vec(&meta)?;
        self.store.put(key, value)
    }

    pub fn drop_index(&self, table: &str, columns: &[&str]) -> Result<()> {
        let key = keys::index_meta_key(table, &Self::meta_name(columns));
        self.store.delete(&key)
    }

    pub fn get_meta(&self, table: &str, columns: &[&str]) -> Result<Option<IndexMeta>> {
        let key = keys::index_meta_key(table, &Self::meta_name(columns));
        match self.store.get(&key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Scans `idxmeta:<table>:` to discover every index declared for a
    /// table. `hasX` callers should always use this rather than assuming
    /// data keys exist.
    pub fn declared_indexes_for_table(&self, table: &str) -> Result<Vec<IndexMeta>> {
        let prefix = {
            let mut p = b"idxmeta:".to_vec();
            p.extend_from_slice(table.as_bytes());
            p.push(b':');
            p
        };
        let mut metas = Vec::new();
        let mut err = None;
        self.store.scan_prefix(&prefix, |_, value| {
            match serde_json::from_slice::<IndexMeta>(value) {
                Ok(m) => metas.push(m),
                Err(e) => err = Some(ThemisError::Serialization(e.to_string())),
            }
            true
        })?;
        if let Some(e) = err {
            return Err(e);
        }
        Ok(metas)
    }

    /// Maintains every declared index of `table` for a write, given the
    /// prior stored value of the entity (`None` on insert) and the new
    /// entity. All mutations are appended to `batch`; unique-constraint
    /// probes happen against the committed store before any mutation is
    /// queued, failing the whole call (and thus the caller's batch) with
    /// `UniqueViolation` on collision.
    pub fn on_put(
        &self,
        table: &str,
        old: Option<&Entity>,
        new: &Entity,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        let metas = self.declared_indexes_for_table(table)?;
        // Unique probes happen first so the whole call fails before any
        // mutation is queued (all-or-nothing per the write path contract).
        for meta in &metas {
            if meta.unique && matches!(meta.kind, IndexKind::Equality | IndexKind::Sparse) {
                let col = meta.primary_column();
                if let Some(new_val) = new.get(col).filter(Value::is_present) {
                    let value_str = value_display(&new_val);
                    let guard_key = keys::unique_guard_key(table, col, &value_str);
                    if let Some(owner_bytes) = self.store.get(&guard_key)? {
                        let owner = String::from_utf8_lossy(&owner_bytes).to_string();
                        if owner != new.pk() {
                            warn!(table, column = col, value = %value_str, owner = %owner, "unique index violation");
                            return Err(ThemisError::UniqueViolation {
                                table: table.to_string(),
                                column: col.to_string(),
                                value: value_str,
                            });
                        }
                    }
                }
            }
        }

        for meta in &metas {
            self.maintain_one(table, meta, old, new, batch)?;
        }
        trace!(table, pk = new.pk(), indexes = metas.len(), "indexes maintained for put");
        Ok(())
    }

    pub fn on_erase(&self, table: &str, old: &Entity, batch: &mut WriteBatch) -> Result<()> {
        let metas = self.declared_indexes_for_table(table)?;
        for meta in &metas {
            self.remove_one(table, meta, old, batch)?;
        }
        Ok(())
    }

    fn maintain_one(
        &self,
        table: &str,
        meta: &IndexMeta,
        old: Option<&Entity>,
        new: &Entity,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        if let Some(old) = old {
            self.remove_one(table, meta, old, batch)?;
        }
        self.emit_one(table, meta, new, batch)
    }

    fn emit_one(&self, table: &str, meta: &IndexMeta, entity: &Entity, batch: &mut WriteBatch) -> Result<()> {
        let pk = entity.pk();
        match meta.kind {
            IndexKind::Equality => {
                let col = meta.primary_column();
                if let Some(v) = entity.get(col) {
                    let value_str = value_display(&v);
                    batch.put(keys::equality_index_key(table, col, &value_str, pk), Vec::new());
                    if meta.unique {
                        batch.put(keys::unique_guard_key(table, col, &value_str), pk.as_bytes().to_vec());
                    }
                }
            }
            IndexKind::Sparse => {
                let col = meta.primary_column();
                if let Some(v) = entity.get(col).filter(Value::is_present) {
                    let value_str = value_display(&v);
                    batch.put(keys::equality_index_key(table, col, &value_str, pk), Vec::new());
                    if meta.unique {
                        batch.put(keys::unique_guard_key(table, col, &value_str), pk.as_bytes().to_vec());
                    }
                }
            }
            IndexKind::Composite => {
                let composite_name = meta.composite_name();
                let values: Option<Vec<String>> =
                    meta.columns.iter().map(|c| entity.get(c).map(|v| value_display(&v))).collect();
                if let Some(values) = values {
                    let refs: Vec<&str> = values.iter().map(String::as_str).collect();
                    batch.put(keys::composite_index_key(table, &composite_name, &refs, pk), Vec::new());
                }
            }
            IndexKind::Range => {
                let col = meta.primary_column();
                if let Some(v) = entity.get(col) {
                    if let Ok(encoded) = keys::sortable_encode(&v) {
                        batch.put(keys::range_index_key(table, col, &encoded, pk), Vec::new());
                    }
                }
            }
            IndexKind::Geo => {
                let col = meta.primary_column();
                if let Some((lat, lon)) = entity.geo_point(col) {
                    let bits = meta.geo_precision_bits.unwrap_or(48);
                    let hash = geo::encode_geohash(lat, lon, bits);
                    batch.put(keys::geo_index_key(table, col, &hash, pk), Vec::new());
                }
            }
            IndexKind::Ttl => {
                let col = meta.primary_column();
                if let Some(expiry) = self.resolve_expiry(entity, col, meta.ttl_seconds) {
                    let flipped = (expiry as u64) ^ (1u64 << 63);
                    batch.put(keys::ttl_index_key(table, col, &flipped.to_be_bytes(), pk), Vec::new());
                }
            }
            IndexKind::Fulltext => {
                let col = meta.primary_column();
                if let Some(text) = entity.get(col).and_then(|v| v.as_str().map(str::to_string)) {
                    let cfg = meta.fulltext.clone().unwrap_or_default();
                    for token in fulltext::tokenize(&text, &cfg) {
                        batch.put(keys::fulltext_key(table, col, &token, pk), Vec::new());
                    }
                }
            }
        }
        Ok(())
    }

    fn remove_one(&self, table: &str, meta: &IndexMeta, entity: &Entity, batch: &mut WriteBatch) -> Result<()> {
        let pk = entity.pk();
        match meta.kind {
            IndexKind::Equality | IndexKind::Sparse => {
                let col = meta.primary_column();
                if let Some(v) = entity.get(col) {
                    if matches!(meta.kind, IndexKind::Equality) || v.is_present() {
                        let value_str = value_display(&v);
                        batch.delete(keys::equality_index_key(table, col, &value_str, pk));
                        if meta.unique {
                            batch.delete(keys::unique_guard_key(table, col, &value_str));
                        }
                    }
                }
            }
            IndexKind::Composite => {
                let composite_name = meta.composite_name();
                let values: Option<Vec<String>> =
                    meta.columns.iter().map(|c| entity.get(c).map(|v| value_display(&v))).collect();
                if let Some(values) = values {
                    let refs: Vec<&str> = values.iter().map(String::as_str).collect();
                    batch.delete(keys::composite_index_key(table, &composite_name, &refs, pk));
                }
            }
            IndexKind::Range => {
                let col = meta.primary_column();
                if let Some(v) = entity.get(col) {
                    if let Ok(encoded) = keys::sortable_encode(&v) {
                        batch.delete(keys::range_index_key(table, col, &encoded, pk));
                    }
                }
            }
            IndexKind::Geo => {
                let col = meta.primary_column();
                if let Some((lat, lon)) = entity.geo_point(col) {
                    let bits = meta.geo_precision_bits.unwrap_or(48);
                    let hash = geo::encode_geohash(lat, lon, bits);
                    batch.delete(keys::geo_index_key(table, col, &hash, pk));
                }
            }
            IndexKind::Ttl => {
                let col = meta.primary_column();
                if let Some(expiry) = self.resolve_expiry(entity, col, meta.ttl_seconds) {
                    let flipped = (expiry as u64) ^ (1u64 << 63);
                    batch.delete(keys::ttl_index_key(table, col, &flipped.to_be_bytes(), pk));
                }
            }
            IndexKind::Fulltext => {
                let col = meta.primary_column();
                if let Some(text) = entity.get(col).and_then(|v| v.as_str().map(str::to_string)) {
                    let cfg = meta.fulltext.clone().unwrap_or_default();
                    for token in fulltext::tokenize(&text, &cfg) {
                        batch.delete(keys::fulltext_key(table, col, &token, pk));
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_expiry(&self, entity: &Entity, col: &str, ttl_seconds: Option<u64>) -> Option<i64> {
        if let Some(Value::Integer(explicit_expiry)) = entity.get(col) {
            return Some(explicit_expiry);
        }
        ttl_seconds.map(|secs| now_epoch_secs() + secs as i64)
    }

    // --- Scans ---

    pub fn scan_keys_equal(&self, table: &str, col: &str, value: &str) -> Result<Vec<String>> {
        let prefix = keys::equality_index_prefix(table, col, value);
        let mut pks = Vec::new();
        self.store.scan_prefix(&prefix, |k, _| {
            if let Some(pk) = k.strip_prefix(prefix.as_slice()) {
                pks.push(String::from_utf8_lossy(pk).to_string());
            }
            true
        })?;
        Ok(pks)
    }

    pub fn estimate_count_equal(&self, table: &str, col: &str, value: &str, cap: usize) -> Result<(usize, bool)> {
        let prefix = keys::equality_index_prefix(table, col, value);
        let mut count = 0usize;
        let mut capped = false;
        self.store.scan_prefix(&prefix, |_, _| {
            count += 1;
            if count > cap {
                capped = true;
                return false;
            }
            true
        })?;
        Ok((count.min(cap), capped))
    }

    pub fn scan_keys_equal_composite(&self, table: &str, columns: &[&str], values: &[&str]) -> Result<Vec<String>> {
        let composite_name = columns.join("+");
        let prefix = keys::composite_index_prefix(table, &composite_name, values);
        let mut pks = Vec::new();
        self.store.scan_prefix(&prefix, |k, _| {
            if let Some(pk) = k.strip_prefix(prefix.as_slice()) {
                pks.push(String::from_utf8_lossy(pk).to_string());
            }
            true
        })?;
        Ok(pks)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn scan_keys_range(
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
        let prefix = keys::range_index_prefix(table, col);
        // Every entry for a given value is `bound(value):<pk>`, strictly
        // greater than the bare bound. So an inclusive endpoint uses the
        // bare bound and an exclusive one appends 0xFF to skip past every
        // entry carrying that exact value, regardless of pk suffix.
        let lo_key = match lo {
            Some(v) => {
                let mut b = keys::range_index_bound(table, col, &keys::sortable_encode(v)?);
                if !lo_inclusive {
                    b.push(0xFF);
                }
                b
            }
            None => prefix.clone(),
        };
        let hi_key = match hi {
            Some(v) => {
                let mut b = keys::range_index_bound(table, col, &keys::sortable_encode(v)?);
                if hi_inclusive {
                    b.push(0xFF);
                }
                b
            }
            None => {
                let mut b = prefix.clone();
                b.push(0xFF);
                b
            }
        };
        let mut pks = Vec::new();
        self.store.scan_range(
            Some(&lo_key),
            Some(&hi_key),
            true,
            false,
            limit,
            reverse,
            |k, _| {
                if k.starts_with(prefix.as_slice()) {
                    if let Some(rest) = k.strip_prefix(prefix.as_slice()) {
                        if let Some(pos) = rest.iter().rposition(|&b| b == b':') {
                            pks.push(String::from_utf8_lossy(&rest[pos + 1..]).to_string());
                        }
                    }
                }
                true
            },
        )?;
        Ok(pks)
    }

    pub fn scan_geo_box(
        &self,
        table: &str,
        col: &str,
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
        precision_bits: u32,
    ) -> Result<Vec<String>> {
        let prefixes = geo::bbox_prefixes(min_lat, min_lon, max_lat, max_lon, precision_bits, precision_bits.min(20));
        let fixed_prefix = keys::geo_index_prefix_for_hash(table, col, "");
        let mut pks = Vec::new();
        for hash_prefix in prefixes {
            let scan_prefix = keys::geo_index_prefix_for_hash(table, col, &hash_prefix);
            self.store.scan_prefix(&scan_prefix, |k, _| {
                if let Some((hash, pk)) = split_geo_key(k, fixed_prefix.len()) {
                    if let Some((lat, lon)) = geo::decode_geohash(&hash, precision_bits) {
                        if lat >= min_lat && lat <= max_lat && lon >= min_lon && lon <= max_lon {
                            pks.push(pk);
                        }
                    }
                }
                true
            })?;
        }
        pks.sort();
        pks.dedup();
        Ok(pks)
    }

    /// Bounding-box scan followed by a Haversine post-filter, per §4.2's
    /// `scanGeoRadius`: builds the enclosing bbox for `(lat,lon,radius_km)`
    /// and keeps only pks whose decoded geohash center is within range.
    pub fn scan_geo_radius(
        &self,
        table: &str,
        col: &str,
        lat: f64,
        lon: f64,
        radius_km: f64,
        precision_bits: u32,
    ) -> Result<Vec<String>> {
        let lat_delta = radius_km / 110.574;
        let lon_delta = radius_km / (111.320 * lat.to_radians().cos().abs().max(1e-6));
        let fixed_prefix = keys::geo_index_prefix_for_hash(table, col, "");
        let prefixes = geo::bbox_prefixes(
            lat - lat_delta,
            lon - lon_delta,
            lat + lat_delta,
            lon + lon_delta,
            precision_bits,
            precision_bits.min(20),
        );
        let mut pks = Vec::new();
        for hash_prefix in prefixes {
            let scan_prefix = keys::geo_index_prefix_for_hash(table, col, &hash_prefix);
            self.store.scan_prefix(&scan_prefix, |k, _| {
                if let Some((hash, pk)) = split_geo_key(k, fixed_prefix.len()) {
                    if let Some(point) = geo::decode_geohash(&hash, precision_bits) {
                        if geo::haversine((lat, lon), point) <= radius_km {
                            pks.push(pk);
                        }
                    }
                }
                true
            })?;
        }
        pks.sort();
        pks.dedup();
        Ok(pks)
    }

    pub fn scan_fulltext(&self, table: &str, col: &str, query: &str, fulltext_cfg: &FulltextConfig) -> Result<Vec<String>> {
        match fulltext::parse_query(query, fulltext_cfg) {
            fulltext::ParsedQuery::And(terms) => self.and_merge_postings(table, col, &terms),
            fulltext::ParsedQuery::Phrase(terms) => {
                let candidates = self.and_merge_postings(table, col, &terms)?;
                let mut matched = Vec::new();
                for pk in candidates {
                    if let Some(text) = self.load_text_field(table, &pk, col)? {
                        let doc_tokens = fulltext::tokenize_ordered(&text, fulltext_cfg);
                        if fulltext::contains_phrase(&doc_tokens, &terms) {
                            matched.push(pk);
                        }
                    }
                }
                Ok(matched)
            }
        }
    }

    fn and_merge_postings(&self, table: &str, col: &str, terms: &[String]) -> Result<Vec<String>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut iter_sets: Vec<std::collections::BTreeSet<String>> = Vec::new();
        for term in terms {
            let prefix = keys::fulltext_token_prefix(table, col, term);
            let mut pks = std::collections::BTreeSet::new();
            self.store.scan_prefix(&prefix, |k, _| {
                if let Some(pk) = k.strip_prefix(prefix.as_slice()) {
                    pks.insert(String::from_utf8_lossy(pk).to_string());
                }
                true
            })?;
            iter_sets.push(pks);
        }
        let mut result = iter_sets.remove(0);
        for set in iter_sets {
            result = result.intersection(&set).cloned().collect();
        }
        Ok(result.into_iter().collect())
    }

    fn load_text_field(&self, table: &str, pk: &str, col: &str) -> Result<Option<String>> {
        let key = keys::primary_key(table, pk);
        match self.store.get(&key)? {
            Some(bytes) => {
                let entity = Entity::from_bytes(pk, &bytes)?;
                Ok(entity.get(col).and_then(|v| v.as_str().map(str::to_string)))
            }
            None => Ok(None),
        }
    }

    /// Scans the TTL index for `(table, col)`, deleting both the primary
    /// record and every declared index entry for each pk whose expiry has
    /// passed. Returns the number of entities erased.
    pub fn cleanup_expired_entities(&self, table: &str, col: &str) -> Result<u64> {
        let now = now_epoch_secs();
        let prefix = keys::ttl_index_prefix(table, col);
        let mut expired_pks = Vec::new();
        self.store.scan_prefix(&prefix, |k, _| {
            if let Some(rest) = k.strip_prefix(prefix.as_slice()) {
                if rest.len() >= 8 {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(&rest[..8]);
                    let expiry = (u64::from_be_bytes(buf) ^ (1u64 << 63)) as i64;
                    if expiry <= now {
                        if let Some(pk_bytes) = rest.get(9..) {
                            expired_pks.push(String::from_utf8_lossy(pk_bytes).to_string());
                        }
                    }
                }
            }
            true
        })?;

        let mut erased = 0u64;
        for pk in expired_pks {
            let primary = keys::primary_key(table, &pk);
            if let Some(bytes) = self.store.get(&primary)? {
                let entity = Entity::from_bytes(&pk, &bytes)?;
                let mut batch = self.store.write_batch();
                batch.delete(primary);
                self.on_erase(table, &entity, &mut batch)?;
                self.store.commit_batch(batch)?;
                erased += 1;
            }
        }
        if erased > 0 {
            debug!(table, column = col, erased, "ttl sweep erased expired entities");
        }
        Ok(erased)
    }

    /// Rebuilds one declared index by scanning every primary record of
    /// `table`. `progress_cb(done, total)` is called periodically; if it
    /// returns `false`, the rebuild stops cleanly (entries already written
    /// remain valid for the portion completed).
    pub fn rebuild_index(
        &self,
        table: &str,
        columns: &[&str],
        mut progress_cb: impl FnMut(u64, u64) -> bool,
    ) -> Result<bool> {
        let meta = self
            .get_meta(table, columns)?
            .ok_or_else(|| ThemisError::Index(format!("no such index on {table}.{}", columns.join("+"))))?;

        let mut all_pks = Vec::new();
        let primary_prefix = keys::primary_prefix(table);
        self.store.scan_prefix(&primary_prefix, |k, _| {
            if let Some(pk) = k.strip_prefix(primary_prefix.as_slice()) {
                all_pks.push(String::from_utf8_lossy(pk).to_string());
            }
            true
        })?;

        let total = all_pks.len() as u64;
        for (done, pk) in all_pks.into_iter().enumerate() {
            let primary = keys::primary_key(table, &pk);
            if let Some(bytes) = self.store.get(&primary)? {
                let entity = Entity::from_bytes(&pk, &bytes)?;
                let mut batch = self.store.write_batch();
                self.emit_one(table, &meta, &entity, &mut batch)?;
                self.store.commit_batch(batch)?;
            }
            if !progress_cb(done as u64 + 1, total) {
                debug!(table, columns = ?columns, done, total, "index rebuild stopped early by progress callback");
                return Ok(false);
            }
        }
        debug!(table, columns = ?columns, total, "index rebuild completed");
        Ok(true)
    }

    pub fn reindex_table(&self, table: &str) -> Result<()> {
        let metas = self.declared_indexes_for_table(table)?;
        for meta in metas {
            let cols: Vec<&str> = meta.columns.iter().map(String::as_str).collect();
            self.rebuild_index(table, &cols, |_, _| true)?;
        }
        Ok(())
    }

    pub fn get_index_stats(&self, table: &str, columns: &[&str]) -> Result<IndexStats> {
        let meta = self
            .get_meta(table, columns)?
            .ok_or_else(|| ThemisError::Index(format!("no such index on {table}.{}", columns.join("+"))))?;
        let prefix: Vec<u8> = match meta.kind {
            IndexKind::Equality | IndexKind::Sparse => keys::equality_column_prefix(table, meta.primary_column()),
            IndexKind::Composite => {
                let mut v = b"idx:".to_vec();
                v.extend_from_slice(table.as_bytes());
                v.push(b':');
                v.extend_from_slice(meta.composite_name().as_bytes());
                v.push(b':');
                v
            }
            IndexKind::Range => keys::range_index_prefix(table, meta.primary_column()),
            IndexKind::Geo => {
                let mut v = b"gidx:".to_vec();
                v.extend_from_slice(table.as_bytes());
                v.push(b':');
                v.extend_from_slice(meta.primary_column().as_bytes());
                v.push(b':');
                v
            }
            IndexKind::Ttl => keys::ttl_index_prefix(table, meta.primary_column()),
            IndexKind::Fulltext => {
                let mut v = b"ftx:".to_vec();
                v.extend_from_slice(table.as_bytes());
                v.push(b':');
                v.extend_from_slice(meta.primary_column().as_bytes());
                v.push(b':');
                v
            }
        };
        let mut count = 0u64;
        self.store.scan_prefix(&prefix, |_, _| {
            count += 1;
            true
        })?;
        Ok(IndexStats { kind: meta.kind, unique: meta.unique, entry_count: count, columns: meta.columns })
    }
}

use crate::core::common::types::Value;

fn value_display(v: &Value) -> String {
    match v {
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Boolean(b) => b.to_string(),
        Value::Blob(b) => crate::core::common::hex::encode(b),
        Value::Vector(_) => String::new(),
        Value::Null => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::StoreConfig;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<LsmKvStore>, SecondaryIndexManager) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LsmKvStore::open(StoreConfig { db_path: dir.path().to_path_buf(), ..Default::default() }).unwrap());
        let mgr = SecondaryIndexManager::new(store.clone());
        (dir, store, mgr)
    }

    fn put_entity(store: &LsmKvStore, table: &str, mgr: &SecondaryIndexManager, pk: &str, email: &str) {
        let mut old = None;
        if let Some(bytes) = store.get(&keys::primary_key(table, pk)).unwrap() {
            old = Some(Entity::from_bytes(pk, &bytes).unwrap());
        }
        let mut entity = Entity::new(pk).unwrap();
        entity.set("email", Value::Text(email.to_string()));
        let mut batch = store.write_batch();
        batch.put(keys::primary_key(table, pk), entity.to_bytes().unwrap());
        mgr.on_put(table, old.as_ref(), &entity, &mut batch).unwrap();
        store.commit_batch(batch).unwrap();
    }

    #[test]
    fn unique_equality_index_rejects_duplicate_value() {
        let (_dir, store, mgr) = setup();
        mgr.declare_index("users", &["email"], IndexKind::Equality, true, None, None, None).unwrap();
        put_entity(&store, "users", &mgr, "u1", "a@x");

        let mut entity = Entity::new("u2").unwrap();
        entity.set("email", Value::Text("a@x".to_string()));
        let mut batch = store.write_batch();
        batch.put(keys::primary_key("users", "u2"), entity.to_bytes().unwrap());
        let result = mgr.on_put("users", None, &entity, &mut batch);
        assert!(matches!(result, Err(ThemisError::UniqueViolation { .. })));
    }

    #[test]
    fn updating_value_moves_equality_entry() {
        let (_dir, store, mgr) = setup();
        mgr.declare_index("users", &["email"], IndexKind::Equality, true, None, None, None).unwrap();
        put_entity(&store, "users", &mgr, "u1", "a@x");
        put_entity(&store, "users", &mgr, "u1", "b@x");

        assert_eq!(mgr.scan_keys_equal("users", "email", "a@x").unwrap(), Vec::<String>::new());
        assert_eq!(mgr.scan_keys_equal("users", "email", "b@x").unwrap(), vec!["u1".to_string()]);
    }

    #[test]
    fn range_scan_respects_bounds_and_reverse() {
        let (_dir, store, mgr) = setup();
        mgr.declare_index("users", &["age"], IndexKind::Range, false, None, None, None).unwrap();
        for (pk, age) in [("u20", 20), ("u25", 25), ("u30", 30), ("u35", 35)] {
            let mut e = Entity::new(pk).unwrap();
            e.set("age", Value::Integer(age));
            let mut batch = store.write_batch();
            batch.put(keys::primary_key("users", pk), e.to_bytes().unwrap());
            mgr.on_put("users", None, &e, &mut batch).unwrap();
            store.commit_batch(batch).unwrap();
        }

        let inclusive = mgr
            .scan_keys_range("users", "age", Some(&Value::Integer(25)), Some(&Value::Integer(30)), true, true, 100, false)
            .unwrap();
        assert_eq!(inclusive, vec!["u25".to_string(), "u30".to_string()]);

        let exclusive = mgr
            .scan_keys_range("users", "age", Some(&Value::Integer(25)), Some(&Value::Integer(30)), false, false, 100, false)
            .unwrap();
        assert!(exclusive.is_empty());

        let reversed = mgr.scan_keys_range("users", "age", None, None, true, true, 100, true).unwrap();
        assert_eq!(reversed, vec!["u35".to_string(), "u30".to_string(), "u25".to_string(), "u20".to_string()]);
    }

    #[test]
    fn geo_box_and_radius_scans_match_expected_points() {
        let (_dir, store, mgr) = setup();
        mgr.declare_index("places", &["loc"], IndexKind::Geo, false, None, None, Some(48)).unwrap();

        let mut nyc = Entity::new("nyc").unwrap();
        nyc.set("loc_lat", Value::Float(40.7128));
        nyc.set("loc_lon", Value::Float(-74.0060));
        let mut newark = Entity::new("newark").unwrap();
        newark.set("loc_lat", Value::Float(40.7357));
        newark.set("loc_lon", Value::Float(-74.1724));
        let mut london = Entity::new("london").unwrap();
        london.set("loc_lat", Value::Float(51.5074));
        london.set("loc_lon", Value::Float(-0.1278));

        for e in [&nyc, &newark, &london] {
            let mut batch = store.write_batch();
            batch.put(keys::primary_key("places", e.pk()), e.to_bytes().unwrap());
            mgr.on_put("places", None, e, &mut batch).unwrap();
            store.commit_batch(batch).unwrap();
        }

        let mut boxed = mgr.scan_geo_box("places", "loc", 40.0, -75.0, 41.0, -73.0, 48).unwrap();
        boxed.sort();
        assert_eq!(boxed, vec!["newark".to_string(), "nyc".to_string()]);

        let mut nearby = mgr.scan_geo_radius("places", "loc", 40.7128, -74.0060, 50.0, 48).unwrap();
        nearby.sort();
        assert_eq!(nearby, vec!["newark".to_string(), "nyc".to_string()]);

        let far = mgr.scan_geo_radius("places", "loc", 40.7128, -74.0060, 1.0, 48).unwrap();
        assert_eq!(far, vec!["nyc".to_string()]);
    }

    #[test]
    fn ttl_sweep_deletes_only_expired_entities() {
        let (_dir, store, mgr) = setup();
        mgr.declare_index("sessions", &["expiry"], IndexKind::Ttl, false, None, None, None).unwrap();

        let mut expired = Entity::new("s1").unwrap();
        expired.set("expiry", Value::Integer(now_epoch_secs() - 10));
        let mut live = Entity::new("s2").unwrap();
        live.set("expiry", Value::Integer(now_epoch_secs() + 10_000));

        for e in [&expired, &live] {
            let mut batch = store.write_batch();
            batch.put(keys::primary_key("sessions", e.pk()), e.to_bytes().unwrap());
            mgr.on_put("sessions", None, e, &mut batch).unwrap();
            store.commit_batch(batch).unwrap();
        }

        let erased = mgr.cleanup_expired_entities("sessions", "expiry").unwrap();
        assert_eq!(erased, 1);
        assert!(store.get(&keys::primary_key("sessions", "s1")).unwrap().is_none());
        assert!(store.get(&keys::primary_key("sessions", "s2")).unwrap().is_some());
    }

    #[test]
    fn fulltext_phrase_query_is_subset_of_and_query() {
        let (_dir, store, mgr) = setup();
        let cfg = FulltextConfig::default();
        mgr.declare_index("docs", &["body"], IndexKind::Fulltext, false, None, Some(cfg.clone()), None).unwrap();

        let mut a = Entity::new("A").unwrap();
        a.set("body", Value::Text("machine learning is fun".to_string()));
        let mut b = Entity::new("B").unwrap();
        b.set("body", Value::Text("learning about machine components".to_string()));

        for e in [&a, &b] {
            let mut batch = store.write_batch();
            batch.put(keys::primary_key("docs", e.pk()), e.to_bytes().unwrap());
            mgr.on_put("docs", None, e, &mut batch).unwrap();
            store.commit_batch(batch).unwrap();
        }

        let mut and_results = mgr.scan_fulltext("docs", "body", "machine learning", &cfg).unwrap();
        and_results.sort();
        assert_eq!(and_results, vec!["A".to_string(), "B".to_string()]);

        let phrase_results = mgr.scan_fulltext("docs", "body", "\"machine learning\"", &cfg).unwrap();
        assert_eq!(phrase_results, vec!["A".to_string()]);
    }

    #[test]
    fn rebuild_index_is_idempotent() {
        let (_dir, store, mgr) = setup();
        mgr.declare_index("users", &["email"], IndexKind::Equality, false, None, None, None).unwrap();
        put_entity(&store, "users", &mgr, "u1", "a@x");

        mgr.rebuild_index("users", &["email"], |_, _| true).unwrap();
        let first = mgr.scan_keys_equal("users", "email", "a@x").unwrap();
        mgr.rebuild_index("users", &["email"], |_, _| true).unwrap();
        let second = mgr.scan_keys_equal("users", "email", "a@x").unwrap();
        assert_eq!(first, second);
    }
}
