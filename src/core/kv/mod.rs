//! KV Store Adapter: the shared LSM-backed key/value substrate every other
//! manager in this crate layers on top of.

pub mod config;
pub mod store;
pub mod wal;

pub use config::{CompressionType, DbPath, FulltextConfig, StoreConfig, VectorPrefilterConfig};
pub use store::{LsmKvStore, Snapshot, Transaction, WriteBatch};
