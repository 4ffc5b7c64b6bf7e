//! Declared index metadata: the source of truth for "does this index
//! exist / what flavor is it", independent of whether any data keys for it
//! currently exist.

use crate::core::kv::config::FulltextConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexKind {
    Equality,
    Composite,
    Range,
    Sparse,
    Geo,
    Ttl,
    Fulltext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub kind: IndexKind,
    pub unique: bool,
    pub columns: Vec<String>,
    pub ttl_seconds: Option<u64>,
    pub fulltext: Option<FulltextConfig>,
    pub geo_precision_bits: Option<u32>,
}

impl IndexMeta {
    pub fn composite_name(&self) -> String {
        self.columns.join("+")
    }

    pub fn primary_column(&self) -> &str {
        self.columns.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub kind: IndexKind,
    pub unique: bool,
    pub entry_count: u64,
    pub columns: Vec<String>,
}
