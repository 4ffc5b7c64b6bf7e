#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::complexity,
    clippy::correctness,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    deprecated,
    unused,
    clippy::todo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::unreachable,
    clippy::missing_safety_doc,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::missing_docs
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::option_if_let_else,
    clippy::cognitive_complexity,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::struct_excessive_bools,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp,
    clippy::doc_markdown,
    clippy::wildcard_imports,
    clippy::struct_field_names,
    clippy::module_inception,
    clippy::missing_fields_in_debug,
    clippy::use_self,
    clippy::return_self_not_must_use,
    clippy::bool_to_int_with_if,
    clippy::partial_pub_fields,
    clippy::multiple_crate_versions,
    clippy::single_match_else,
    clippy::implicit_hasher,
    clippy::linkedlist,
    clippy::default_trait_access,
    clippy::missing_transmute_annotations,
    clippy::multiple_inherent_impl,
    clippy::get_unwrap,
    clippy::impl_trait_in_params,
    clippy::future_not_send,
    clippy::type_complexity,
    clippy::result_large_err,
    clippy::large_stack_frames,
    clippy::significant_drop_in_scrutinee,
    clippy::significant_drop_tightening,
    clippy::items_after_statements,
    clippy::match_wildcard_for_single_variants,
    clippy::needless_pass_by_value,
    clippy::redundant_closure_for_method_calls,
    clippy::unused_async,
    clippy::unnecessary_wraps,
    clippy::trivially_copy_pass_by_ref,
    clippy::match_same_arms,
    clippy::explicit_deref_methods,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
    clippy::from_iter_instead_of_collect,
    clippy::if_not_else,
    clippy::equatable_if_let,
    clippy::or_fun_call,
    clippy::iter_without_into_iter,
    clippy::infinite_loop,
    clippy::ref_as_ptr,
    clippy::ref_option_ref,
    clippy::option_option,
    clippy::match_bool,
    clippy::let_underscore_untyped,
    clippy::empty_enum_variants_with_brackets,
    clippy::pattern_type_mismatch,
    clippy::ignored_unit_patterns,
    clippy::redundant_pub_crate,
    clippy::allow_attributes,
    clippy::no_effect_underscore_binding,
    clippy::used_underscore_binding,
    clippy::tests_outside_test_module
)]

//! # Themis - a multi-model indexing core
//!
//! Themis is an embeddable indexing core over a shared LSM-lite key/value
//! store: schema-less entities, seven flavors of secondary index, a graph
//! adjacency and property index with temporal traversal, an HNSW vector
//! index, and a changefeed — all written through one coordinator so an
//! entity mutation, its index maintenance, and its CDC event commit as one
//! atomic unit.
//!
//! ## Quick Start
//!
//! ```no_run
//! use themis::{Database, StoreConfig};
//! use themis::core::common::types::Value;
//! use themis::core::entity::Entity;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(StoreConfig { db_path: "my_database".into(), ..Default::default() })?;
//!
//! let mut user = Entity::new("u1")?;
//! user.set("email", Value::Text("alice@example.com".to_string()));
//! db.put_entity("users", &user)?;
//!
//! let fetched = db.get_entity("users", "u1")?;
//! assert!(fetched.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **KV Store Adapter**: `core::kv` — the always-resident memtable, WAL,
//!   and snapshot flush every other manager is layered on.
//! - **Entity Layer**: `core::entity` — primary-keyed, schema-less records.
//! - **Key Schema**: `core::keys` — the one byte-string key family every
//!   manager encodes into and decodes out of.
//! - **Secondary Index Manager**: `core::secondary_index` — equality,
//!   composite, range, sparse, geo, TTL, and fulltext indexes, plus a
//!   unique constraint orthogonal to index kind.
//! - **Graph Index Manager**: `core::graph_index` — adjacency indexes, an
//!   in-memory topology cache, BFS/Dijkstra/A*, node labels, edge types,
//!   and temporal aggregate queries.
//! - **Vector Index Manager**: `core::vector_index` — HNSW approximate
//!   nearest-neighbor search with a brute-force fallback and whitelist
//!   prefiltering.
//! - **Changefeed**: `core::changefeed` — a gapless, strictly-ordered
//!   change log with long-poll delivery and SSE rendering.
//! - **Write Coordinator**: `core::txn_coordinator` — one atomic batch
//!   spanning the primary record, every declared index, and one CDC event.
//!
//! [`Database`] wires all of the above together behind one handle; the
//! `core` module is available directly for callers who want a single
//! manager without the rest.

pub mod api;
pub mod core;

pub use api::Database;
pub use crate::core::common::error::{Result as ThemisResult, ThemisError};
pub use crate::core::common::types::Value;
pub use crate::core::kv::StoreConfig;

/// Installs a `tracing-subscriber` `fmt` layer reading `RUST_LOG` (default
/// `info`), for examples and tests that want to see this crate's
/// `tracing::debug!`/`warn!` output. The library itself never installs a
/// subscriber on its own (no hidden global state per §9) — embedding
/// binaries that already own a subscriber should not call this.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Entity;
    use tempfile::TempDir;

    #[test]
    fn database_opens_and_round_trips_an_entity() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(StoreConfig { db_path: dir.path().to_path_buf(), ..Default::default() }).unwrap();

        let mut user = Entity::new("u1").unwrap();
        user.set("email", Value::Text("alice@example.com".to_string()));
        db.put_entity("users", &user).unwrap();

        let fetched = db.get_entity("users", "u1").unwrap().unwrap();
        assert_eq!(fetched.get("email"), Some(Value::Text("alice@example.com".to_string())));
    }

    #[test]
    fn reopening_the_same_path_recovers_prior_writes() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig { db_path: dir.path().to_path_buf(), ..Default::default() };
        {
            let db = Database::open(config.clone()).unwrap();
            let user = Entity::new("u1").unwrap();
            db.put_entity("users", &user).unwrap();
        }
        let reopened = Database::open(config).unwrap();
        assert!(reopened.get_entity("users", "u1").unwrap().is_some());
    }
}
