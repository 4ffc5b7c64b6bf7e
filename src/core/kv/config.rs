//! Configuration surface for the KV store adapter, grounded on the
//! RocksDB-style wrapper this engine's semantics are modeled after. Knobs
//! are exposed and defaulted; only a handful (`enable_wal`, compression,
//! `memtable_size_mb`) currently change observable behavior in this
//! pure-Rust engine, the rest are accepted and stored so persisted
//! configuration round-trips and so a future tiered-storage backend has
//! somewhere to read them from.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One data-file target, mirroring a RocksDB `DbPath` (path + target size).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DbPath {
    pub path: PathBuf,
    pub target_size_bytes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lz4,
    Lz4hc,
    Zstd,
    Snappy,
    Zlib,
    Bzip2,
}

impl Default for CompressionType {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub wal_dir: Option<PathBuf>,
    pub db_paths: Vec<DbPath>,
    pub memtable_size_mb: u64,
    pub block_cache_size_mb: u64,
    pub cache_index_and_filter_blocks: bool,
    pub pin_l0_filter_and_index_blocks_in_cache: bool,
    pub partition_filters: bool,
    pub high_pri_pool_ratio: f64,
    pub bloom_bits_per_key: u32,
    pub enable_wal: bool,
    pub enable_blobdb: bool,
    pub blob_size_threshold: u64,
    pub max_background_jobs: u32,
    pub use_universal_compaction: bool,
    pub dynamic_level_bytes: bool,
    pub target_file_size_base_mb: u64,
    pub max_bytes_for_level_base_mb: u64,
    pub max_write_buffer_number: u32,
    pub min_write_buffer_number_to_merge: u32,
    pub use_direct_reads: bool,
    pub use_direct_io_for_flush_and_compaction: bool,
    pub compression_default: CompressionType,
    pub compression_bottommost: CompressionType,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/themis"),
            wal_dir: None,
            db_paths: Vec::new(),
            memtable_size_mb: 256,
            block_cache_size_mb: 1024,
            cache_index_and_filter_blocks: true,
            pin_l0_filter_and_index_blocks_in_cache: true,
            partition_filters: true,
            high_pri_pool_ratio: 0.5,
            bloom_bits_per_key: 10,
            enable_wal: true,
            enable_blobdb: true,
            blob_size_threshold: 4096,
            max_background_jobs: 4,
            use_universal_compaction: false,
            dynamic_level_bytes: true,
            target_file_size_base_mb: 64,
            max_bytes_for_level_base_mb: 256,
            max_write_buffer_number: 3,
            min_write_buffer_number_to_merge: 1,
            use_direct_reads: false,
            use_direct_io_for_flush_and_compaction: false,
            compression_default: CompressionType::None,
            compression_bottommost: CompressionType::None,
        }
    }
}

impl StoreConfig {
    pub fn wal_directory(&self) -> PathBuf {
        self.wal_dir.clone().unwrap_or_else(|| self.db_path.clone())
    }
}

/// Fulltext tokenizer configuration (spec's "Fulltext" configuration
/// surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulltextConfig {
    pub language: String,
    pub stemming_enabled: bool,
    pub stopwords_enabled: bool,
    pub normalize_umlauts: bool,
}

impl Default for FulltextConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            stemming_enabled: false,
            stopwords_enabled: true,
            normalize_umlauts: true,
        }
    }
}

/// Vector whitelist-prefiltering configuration, persisted as `config:vector`
/// JSON alongside each object's HNSW metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPrefilterConfig {
    pub whitelist_prefilter_enabled: bool,
    pub whitelist_initial_factor: f64,
    pub whitelist_min_candidates: usize,
    pub whitelist_max_attempts: u32,
    pub whitelist_growth_factor: f64,
}

impl Default for VectorPrefilterConfig {
    fn default() -> Self {
        Self {
            whitelist_prefilter_enabled: true,
            whitelist_initial_factor: 4.0,
            whitelist_min_candidates: 1,
            whitelist_max_attempts: 3,
            whitelist_growth_factor: 2.0,
        }
    }
}
