//! Deterministic byte-string key schema.
//!
//! Every logical key in the system is a byte string built from these
//! functions. Lexicographic order over the bytes equals semantic order
//! within its family, so range scans can be served directly by the
//! underlying store's ordered iteration.

use crate::core::common::types::Value;

/// Separator between composite-index tuple values. Chosen because `0x1F`
/// (ASCII Unit Separator) cannot occur in any of our value encodings.
pub const COMPOSITE_SEPARATOR: u8 = 0x1F;

/// Number of decimal digits a changefeed sequence is zero-padded to, so
/// lexicographic order over `changefeed:<seq>` keys matches sequence order.
pub const CDC_SEQUENCE_WIDTH: usize = 20;

fn push_all(parts: &[&[u8]]) -> Vec<u8> {
    let total: usize = parts.iter().map(|p| p.len()).sum::<usize>() + parts.len().saturating_sub(1);
    let mut out = Vec::with_capacity(total);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(b':');
        }
        out.extend_from_slice(part);
    }
    out
}

pub fn primary_key(table: &str, pk: &str) -> Vec<u8> {
    push_all(&[table.as_bytes(), pk.as_bytes()])
}

pub fn primary_prefix(table: &str) -> Vec<u8> {
    let mut v = table.as_bytes().to_vec();
    v.push(b':');
    v
}

pub fn equality_index_key(table: &str, col: &str, value: &str, pk: &str) -> Vec<u8> {
    push_all(&[b"idx", table.as_bytes(), col.as_bytes(), value.as_bytes(), pk.as_bytes()])
}

pub fn equality_index_prefix(table: &str, col: &str, value: &str) -> Vec<u8> {
    let mut v = push_all(&[b"idx", table.as_bytes(), col.as_bytes(), value.as_bytes()]);
    v.push(b':');
    v
}

pub fn equality_column_prefix(table: &str, col: &str) -> Vec<u8> {
    let mut v = push_all(&[b"idx", table.as_bytes(), col.as_bytes()]);
    v.push(b':');
    v
}

/// Joins an ordered tuple of column names with `+` to name a composite index.
pub fn composite_column_name(cols: &[&str]) -> String {
    cols.join("+")
}

pub fn composite_index_key(table: &str, composite_col: &str, values: &[&str], pk: &str) -> Vec<u8> {
    let mut joined = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            joined.push(COMPOSITE_SEPARATOR);
        }
        joined.extend_from_slice(v.as_bytes());
    }
    push_all(&[b"idx", table.as_bytes(), composite_col.as_bytes(), &joined, pk.as_bytes()])
}

pub fn composite_index_prefix(table: &str, composite_col: &str, values: &[&str]) -> Vec<u8> {
    let mut joined = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            joined.push(COMPOSITE_SEPARATOR);
        }
        joined.extend_from_slice(v.as_bytes());
    }
    let mut v = push_all(&[b"idx", table.as_bytes(), composite_col.as_bytes(), &joined]);
    v.push(b':');
    v
}

pub fn range_index_key(table: &str, col: &str, sortable_value: &[u8], pk: &str) -> Vec<u8> {
    let mut v = push_all(&[b"ridx", table.as_bytes(), col.as_bytes()]);
    v.push(b':');
    v.extend_from_slice(sortable_value);
    v.push(b':');
    v.extend_from_slice(pk.as_bytes());
    v
}

pub fn range_index_prefix(table: &str, col: &str) -> Vec<u8> {
    let mut v = push_all(&[b"ridx", table.as_bytes(), col.as_bytes()]);
    v.push(b':');
    v
}

/// Builds a key bound for a range scan: the column prefix followed by the
/// sortable encoding of a boundary value, with no trailing pk (so it sorts
/// just before any key with that value prefix).
pub fn range_index_bound(table: &str, col: &str, sortable_value: &[u8]) -> Vec<u8> {
    let mut v = range_index_prefix(table, col);
    v.extend_from_slice(sortable_value);
    v
}

pub fn geo_index_key(table: &str, col: &str, geohash: &str, pk: &str) -> Vec<u8> {
    push_all(&[b"gidx", table.as_bytes(), col.as_bytes(), geohash.as_bytes(), pk.as_bytes()])
}

pub fn geo_index_prefix_for_hash(table: &str, col: &str, geohash_prefix: &str) -> Vec<u8> {
    push_all(&[b"gidx", table.as_bytes(), col.as_bytes(), geohash_prefix.as_bytes()])
}

pub fn ttl_index_key(table: &str, col: &str, expiry_be: &[u8; 8], pk: &str) -> Vec<u8> {
    let mut v = push_all(&[b"ttl", table.as_bytes(), col.as_bytes()]);
    v.push(b':');
    v.extend_from_slice(expiry_be);
    v.push(b':');
    v.extend_from_slice(pk.as_bytes());
    v
}

pub fn ttl_index_prefix(table: &str, col: &str) -> Vec<u8> {
    let mut v = push_all(&[b"ttl", table.as_bytes(), col.as_bytes()]);
    v.push(b':');
    v
}

pub fn fulltext_key(table: &str, col: &str, token: &str, pk: &str) -> Vec<u8> {
    push_all(&[b"ftx", table.as_bytes(), col.as_bytes(), token.as_bytes(), pk.as_bytes()])
}

pub fn fulltext_token_prefix(table: &str, col: &str, token: &str) -> Vec<u8> {
    let mut v = push_all(&[b"ftx", table.as_bytes(), col.as_bytes(), token.as_bytes()]);
    v.push(b':');
    v
}

pub fn unique_guard_key(table: &str, col: &str, value: &str) -> Vec<u8> {
    push_all(&[b"uniq", table.as_bytes(), col.as_bytes(), value.as_bytes()])
}

pub fn index_meta_key(table: &str, col_or_composite: &str) -> Vec<u8> {
    push_all(&[b"idxmeta", table.as_bytes(), col_or_composite.as_bytes()])
}

pub fn edge_key(eid: &str) -> Vec<u8> {
    push_all(&[b"edge", eid.as_bytes()])
}

pub fn adjacency_out_key(graph_id: &str, from: &str, eid: &str) -> Vec<u8> {
    push_all(&[b"graph", b"out", graph_id.as_bytes(), from.as_bytes(), eid.as_bytes()])
}

pub fn adjacency_out_prefix(graph_id: &str, from: &str) -> Vec<u8> {
    let mut v = push_all(&[b"graph", b"out", graph_id.as_bytes(), from.as_bytes()]);
    v.push(b':');
    v
}

pub fn adjacency_in_key(graph_id: &str, to: &str, eid: &str) -> Vec<u8> {
    push_all(&[b"graph", b"in", graph_id.as_bytes(), to.as_bytes(), eid.as_bytes()])
}

pub fn adjacency_in_prefix(graph_id: &str, to: &str) -> Vec<u8> {
    let mut v = push_all(&[b"graph", b"in", graph_id.as_bytes(), to.as_bytes()]);
    v.push(b':');
    v
}

pub fn graph_out_scan_prefix(graph_id: &str) -> Vec<u8> {
    let mut v = push_all(&[b"graph", b"out", graph_id.as_bytes()]);
    v.push(b':');
    v
}

pub fn graph_in_scan_prefix(graph_id: &str) -> Vec<u8> {
    let mut v = push_all(&[b"graph", b"in", graph_id.as_bytes()]);
    v.push(b':');
    v
}

pub fn node_key(graph_id: &str, pk: &str) -> Vec<u8> {
    push_all(&[b"node", graph_id.as_bytes(), pk.as_bytes()])
}

pub fn node_prefix(graph_id: &str) -> Vec<u8> {
    let mut v = push_all(&[b"node", graph_id.as_bytes()]);
    v.push(b':');
    v
}

pub fn label_key(graph_id: &str, label: &str, pk: &str) -> Vec<u8> {
    push_all(&[b"label", graph_id.as_bytes(), label.as_bytes(), pk.as_bytes()])
}

pub fn label_prefix(graph_id: &str, label: &str) -> Vec<u8> {
    let mut v = push_all(&[b"label", graph_id.as_bytes(), label.as_bytes()]);
    v.push(b':');
    v
}

pub fn edge_type_key(graph_id: &str, edge_type: &str, eid: &str) -> Vec<u8> {
    push_all(&[b"type", graph_id.as_bytes(), edge_type.as_bytes(), eid.as_bytes()])
}

pub fn edge_type_prefix(graph_id: &str, edge_type: &str) -> Vec<u8> {
    let mut v = push_all(&[b"type", graph_id.as_bytes(), edge_type.as_bytes()]);
    v.push(b':');
    v
}

pub fn vector_object_key(object_name: &str, pk: &str) -> Vec<u8> {
    push_all(&[object_name.as_bytes(), pk.as_bytes()])
}

pub fn vector_object_prefix(object_name: &str) -> Vec<u8> {
    let mut v = object_name.as_bytes().to_vec();
    v.push(b':');
    v
}

pub fn vector_config_key(object_name: &str) -> Vec<u8> {
    push_all(&[b"config", b"vector", object_name.as_bytes()])
}

pub const CHANGEFEED_SEQUENCE_KEY: &[u8] = b"changefeed_sequence";
pub const CHANGEFEED_PREFIX: &[u8] = b"changefeed:";

pub fn changefeed_event_key(seq: u64) -> Vec<u8> {
    let mut v = CHANGEFEED_PREFIX.to_vec();
    v.extend_from_slice(format!("{seq:0width$}", width = CDC_SEQUENCE_WIDTH).as_bytes());
    v
}

/// Encodes a value to a byte string such that lexicographic comparison of
/// encodings equals natural comparison of values. Integers use fixed-width
/// big-endian with the sign bit flipped; floats map IEEE-754 bits to a
/// sortable unsigned 64-bit integer; strings and bytes pass through
/// unchanged (already lexicographically ordered).
pub fn sortable_encode(value: &Value) -> Result<Vec<u8>, crate::core::common::error::ThemisError> {
    use crate::core::common::error::ThemisError;
    match value {
        Value::Integer(i) => {
            let flipped = (*i as u64) ^ (1u64 << 63);
            Ok(flipped.to_be_bytes().to_vec())
        }
        Value::Float(f) => Ok(sortable_float_bits(*f).to_be_bytes().to_vec()),
        Value::Text(s) => Ok(s.as_bytes().to_vec()),
        Value::Boolean(b) => Ok(vec![u8::from(*b)]),
        Value::Blob(b) => Ok(b.clone()),
        Value::Null => Err(ThemisError::InvalidInput(
            "cannot encode null into a sortable range key".to_string(),
        )),
        Value::Vector(_) => Err(ThemisError::InvalidInput(
            "vector values are not range-sortable".to_string(),
        )),
    }
}

/// Maps an `f64`'s IEEE-754 bit pattern to a `u64` whose unsigned ordering
/// matches the float's natural ordering (NaNs excluded from consideration).
fn sortable_float_bits(f: f64) -> u64 {
    let bits = f.to_bits();
    if bits & (1u64 << 63) != 0 {
        !bits
    } else {
        bits | (1u64 << 63)
    }
}
