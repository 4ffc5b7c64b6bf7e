//! The LSM-lite key/value store: an always-resident ordered memtable
//! (`BTreeMap`) backed by a write-ahead log for durability and periodic
//! full-snapshot flushes, generalizing
//! `core::storage::engine::simple_file_kv_store`'s "rewrite whole file on
//! flush" persistence model to a batch-oriented, MVCC-aware adapter.

use crate::core::common::error::{Result, ThemisError};
use crate::core::kv::config::StoreConfig;
use crate::core::kv::wal::{WalRecord, WalWriter};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// A versioned cell: every live key in the memtable carries the version
/// (write-batch id) that last touched it, so an MVCC transaction can detect
/// a write that happened after its snapshot was taken.
#[derive(Debug, Clone)]
struct VersionedValue {
    value: Option<Vec<u8>>,
    version: u64,
}

/// Snapshot-read view over the store at a point-in-time version. Reads
/// always see keys whose version is `<= snapshot_version`; since this
/// engine keeps only the latest value per key (no MVCC history chain), a
/// long-lived snapshot cannot see values superseded after it started. This
/// matches the spec's invariant of "a consistent point-in-time view" for
/// the duration of one transaction (no concurrent compaction can reclaim
/// the only copy mid-transaction because the writer serializes through one
/// mutex).
pub struct Snapshot {
    version: u64,
}

pub struct LsmKvStore {
    config: StoreConfig,
    memtable: RwLock<BTreeMap<Vec<u8>, VersionedValue>>,
    wal: WalWriter,
    next_version: AtomicU64,
    write_lock: Mutex<()>,
    open: RwLock<bool>,
}

impl LsmKvStore {
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.db_path)?;
        let wal = WalWriter::new(&config.wal_directory());
        let store = Self {
            memtable: RwLock::new(BTreeMap::new()),
            wal,
            next_version: AtomicU64::new(1),
            write_lock: Mutex::new(()),
            open: RwLock::new(true),
            config,
        };
        store.load_snapshot()?;
        store.replay_wal()?;
        debug!(db_path = %store.config.db_path.display(), enable_wal = store.config.enable_wal, "store opened");
        Ok(store)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.config.db_path.join("snapshot.json")
    }

    fn load_snapshot(&self) -> Result<()> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(());
        }
        let bytes = fs::read(&path)?;
        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            serde_json::from_slice(&bytes).map_err(|e| ThemisError::Corruption(e.to_string()))?;
        let mut table = self.memtable.write()?;
        for (k, v) in entries {
            table.insert(k, VersionedValue { value: Some(v), version: 0 });
        }
        Ok(())
    }

    fn replay_wal(&self) -> Result<()> {
        if !self.config.enable_wal {
            return Ok(());
        }
        let records = self.wal.replay()?;
        let mut table = self.memtable.write()?;
        let mut pending: Vec<&WalRecord> = Vec::new();
        let mut max_version = 0u64;
        for record in &records {
            match record {
                WalRecord::Put { batch_id, .. } | WalRecord::Delete { batch_id, .. } => {
                    pending.push(record);
                    max_version = max_version.max(*batch_id);
                }
                WalRecord::BatchCommit { batch_id } => {
                    for p in pending.drain(..) {
                        apply_record(&mut table, p, *batch_id);
                    }
                }
            }
        }
        self.next_version.store(max_version + 1, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> Result<bool> {
        Ok(*self.open.read()?)
    }

    pub fn close(&self) -> Result<()> {
        self.flush()?;
        *self.open.write()? = false;
        debug!(db_path = %self.config.db_path.display(), "store closed");
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.memtable.read()?;
        Ok(table.get(key).and_then(|v| v.value.clone()))
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut batch = self.write_batch();
        batch.put(key, value);
        self.commit_batch(batch)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut batch = self.write_batch();
        batch.delete(key.to_vec());
        self.commit_batch(batch)
    }

    pub fn write_batch(&self) -> WriteBatch {
        WriteBatch { ops: Vec::new() }
    }

    /// Atomically applies every operation in `batch`: WAL-logs all puts and
    /// deletes, then a commit record, then mutates the memtable. A batch
    /// with zero ops is a no-op.
    pub fn commit_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.ops.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock()?;
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);

        if self.config.enable_wal {
            for op in &batch.ops {
                let record = match op {
                    BatchOp::Put { key, value } => {
                        WalRecord::Put { batch_id: version, key: key.clone(), value: value.clone() }
                    }
                    BatchOp::Delete { key } => WalRecord::Delete { batch_id: version, key: key.clone() },
                };
                self.wal.append(&record)?;
            }
            self.wal.append(&WalRecord::BatchCommit { batch_id: version })?;
        }

        let mut table = self.memtable.write()?;
        for op in &batch.ops {
            match op {
                BatchOp::Put { key, value } => {
                    table.insert(key.clone(), VersionedValue { value: Some(value.clone()), version });
                }
                BatchOp::Delete { key } => {
                    table.insert(key.clone(), VersionedValue { value: None, version });
                }
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot { version: self.next_version.load(Ordering::SeqCst) })
    }

    pub fn begin_transaction(&self) -> Result<Transaction<'_>> {
        Ok(Transaction { store: self, snapshot: self.snapshot()?, writes: BTreeMap::new(), read_versions: BTreeMap::new() })
    }

    /// Iterates all keys under `prefix` in ascending order, invoking
    /// `visit(key, value)` for each. Stops early if `visit` returns `false`.
    pub fn scan_prefix<F>(&self, prefix: &[u8], mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let table = self.memtable.read()?;
        for (k, v) in table.range(prefix.to_vec()..) {
            if !k.starts_with(prefix) {
                break;
            }
            if let Some(value) = &v.value {
                if !visit(k, value) {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Half-open range scan `[lo, hi)` honoring inclusivity flags, a hard
    /// `limit`, and an optional reverse direction.
    #[allow(clippy::too_many_arguments)]
    pub fn scan_range<F>(
        &self,
        lo: Option<&[u8]>,
        hi: Option<&[u8]>,
        lo_inclusive: bool,
        hi_inclusive: bool,
        limit: usize,
        reverse: bool,
        mut visit: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let table = self.memtable.read()?;
        let in_bounds = |k: &[u8]| -> bool {
            if let Some(lo) = lo {
                if lo_inclusive {
                    if k < lo {
                        return false;
                    }
                } else if k <= lo {
                    return false;
                }
            }
            if let Some(hi) = hi {
                if hi_inclusive {
                    if k > hi {
                        return false;
                    }
                } else if k >= hi {
                    return false;
                }
            }
            true
        };
        let mut count = 0;
        if reverse {
            for (k, v) in table.iter().rev() {
                if !in_bounds(k) {
                    continue;
                }
                if let Some(value) = &v.value {
                    if !visit(k, value) || {
                        count += 1;
                        count >= limit && limit > 0
                    } {
                        break;
                    }
                }
            }
        } else {
            for (k, v) in table.iter() {
                if !in_bounds(k) {
                    continue;
                }
                if let Some(value) = &v.value {
                    if !visit(k, value) || {
                        count += 1;
                        count >= limit && limit > 0
                    } {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let table = self.memtable.read()?;
        let entries: Vec<(&Vec<u8>, &Vec<u8>)> =
            table.iter().filter_map(|(k, v)| v.value.as_ref().map(|val| (k, val))).collect();
        let json = serde_json::to_vec(&entries).map_err(|e| ThemisError::Serialization(e.to_string()))?;
        let tmp_path = self.snapshot_path().with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(&json)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, self.snapshot_path())?;
        drop(table);
        if self.config.enable_wal {
            self.wal.truncate()?;
        }
        Ok(())
    }

    pub fn approximate_size(&self) -> Result<u64> {
        let table = self.memtable.read()?;
        Ok(table
            .iter()
            .filter_map(|(k, v)| v.value.as_ref().map(|val| (k.len() + val.len()) as u64))
            .sum())
    }

    /// Creates an on-disk copy of the store's data directory. Refuses if
    /// the store has been closed, per the checkpoint semantics this
    /// adapter's configuration surface is modeled on.
    pub fn create_checkpoint(&self, dest_dir: &Path) -> Result<()> {
        if !self.is_open()? {
            return Err(ThemisError::InvalidInput("cannot checkpoint a closed store".to_string()));
        }
        self.flush()?;
        fs::create_dir_all(dest_dir)?;
        for entry in fs::read_dir(&self.config.db_path)? {
            let entry = entry?;
            let dest = dest_dir.join(entry.file_name());
            fs::copy(entry.path(), dest)?;
        }
        debug!(dest = %dest_dir.display(), "checkpoint created");
        Ok(())
    }

    /// Replaces the data directory with `checkpoint_dir`'s contents and
    /// reopens the store in place. Caller must not hold any outstanding
    /// transactions across this call.
    pub fn restore_from_checkpoint(&self, checkpoint_dir: &Path) -> Result<()> {
        fs::create_dir_all(&self.config.db_path)?;
        for entry in fs::read_dir(&self.config.db_path)? {
            let entry = entry?;
            if entry.path().is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        for entry in fs::read_dir(checkpoint_dir)? {
            let entry = entry?;
            let dest = self.config.db_path.join(entry.file_name());
            fs::copy(entry.path(), dest)?;
        }
        self.memtable.write()?.clear();
        self.load_snapshot()?;
        self.replay_wal()?;
        debug!(checkpoint_dir = %checkpoint_dir.display(), "store restored from checkpoint");
        Ok(())
    }
}

fn apply_record(table: &mut BTreeMap<Vec<u8>, VersionedValue>, record: &WalRecord, version: u64) {
    match record {
        WalRecord::Put { key, value, .. } => {
            table.insert(key.clone(), VersionedValue { value: Some(value.clone()), version });
        }
        WalRecord::Delete { key, .. } => {
            table.insert(key.clone(), VersionedValue { value: None, version });
        }
        WalRecord::BatchCommit { .. } => {}
    }
}

#[derive(Debug, Clone)]
enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// An atomic write batch: operations commit or discard together. Dropping
/// a batch without calling `LsmKvStore::commit_batch` simply discards it
/// (it owns no store-side resources to release).
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Drains the batch into `(key, Some(value) | None)` pairs so a caller
    /// building a batch across several managers (see `txn_coordinator`) can
    /// re-stage the result inside an MVCC `Transaction`'s write-set.
    pub fn into_ops(self) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Put { key, value } => (key, Some(value)),
                BatchOp::Delete { key } => (key, None),
            })
            .collect()
    }
}

/// An MVCC transaction using optimistic concurrency control: reads are
/// served from a consistent snapshot version, writes are buffered locally,
/// and `commit` fails with `ConflictRetryable` if any key it touched (read
/// or written) was modified by another transaction after this one's
/// snapshot was taken.
pub struct Transaction<'a> {
    store: &'a LsmKvStore,
    snapshot: Snapshot,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    read_versions: BTreeMap<Vec<u8>, u64>,
}

impl<'a> Transaction<'a> {
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        let table = self.store.memtable.read()?;
        match table.get(key) {
            Some(v) => {
                self.read_versions.insert(key.to_vec(), v.version);
                Ok(v.value.clone())
            }
            None => {
                self.read_versions.insert(key.to_vec(), 0);
                Ok(None)
            }
        }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    pub fn is_active(&self) -> bool {
        true
    }

    pub fn snapshot_version(&self) -> u64 {
        self.snapshot.version
    }

    /// Validates the read-set against the current memtable, then applies
    /// the write-set as one `WriteBatch`. Returns `ConflictRetryable` if
    /// any read key's version advanced since this transaction's snapshot.
    pub fn commit(self) -> Result<()> {
        let _guard = self.store.write_lock.lock()?;
        {
            let table = self.store.memtable.read()?;
            for (key, seen_version) in &self.read_versions {
                let current_version = table.get(key).map_or(0, |v| v.version);
                if current_version != *seen_version {
                    warn!(key = %String::from_utf8_lossy(key), "transaction conflict on commit, retry required");
                    return Err(ThemisError::ConflictRetryable);
                }
            }
        }
        drop(_guard);

        let mut batch = self.store.write_batch();
        for (key, value) in self.writes {
            match value {
                Some(v) => batch.put(key, v),
                None => batch.delete(key),
            }
        }
        self.store.commit_batch(batch)
    }

    pub fn rollback(self) {
        // Buffered writes are simply dropped; nothing was applied.
    }
}
