//! Write coordinator: the single path by which an entity mutation, its
//! secondary-index maintenance, and its changefeed event become one
//! atomic unit. Grounded on `core::kv::store::Transaction`'s optimistic
//! concurrency control, with the write-set assembled via the same
//! `WriteBatch` the index and changefeed managers already build their own
//! mutations into — `WriteBatch::into_ops` lets this module re-stage that
//! batch inside the transaction's write-set instead of committing it
//! directly, so a concurrent conflicting writer is caught before anything
//! lands.

use crate::core::changefeed::{ChangefeedManager, EventType};
use crate::core::common::error::Result;
use crate::core::entity::Entity;
use crate::core::keys;
use crate::core::kv::LsmKvStore;
use crate::core::secondary_index::SecondaryIndexManager;
use serde_json::json;
use std::sync::Arc;
use tracing::trace;

/// Coordinates a single logical write across the primary entity record,
/// every index declared on its table, and one changefeed event, committing
/// all of it as one MVCC transaction. Callers that receive
/// `ThemisError::ConflictRetryable` from `put_entity`/`erase_entity` should
/// retry the whole call; none of the constituent managers leave partial
/// state behind on a conflict because nothing is staged until `commit`.
pub struct TxnCoordinator {
    store: Arc<LsmKvStore>,
    indexes: Arc<SecondaryIndexManager>,
    changefeed: Arc<ChangefeedManager>,
}

impl TxnCoordinator {
    pub fn new(store: Arc<LsmKvStore>, indexes: Arc<SecondaryIndexManager>, changefeed: Arc<ChangefeedManager>) -> Self {
        Self { store, indexes, changefeed }
    }

    pub fn store(&self) -> &Arc<LsmKvStore> {
        &self.store
    }

    pub fn indexes(&self) -> &Arc<SecondaryIndexManager> {
        &self.indexes
    }

    pub fn changefeed(&self) -> &Arc<ChangefeedManager> {
        &self.changefeed
    }

    /// Inserts or updates `entity` in `table`: reads the prior stored value
    /// (if any) under the transaction's snapshot, maintains every declared
    /// index, appends one `Put` changefeed event, and commits all of it
    /// together. Returns the allocated changefeed sequence number.
    pub fn put_entity(&self, table: &str, entity: &Entity) -> Result<u64> {
        let primary_key = keys::primary_key(table, entity.pk());
        let mut txn = self.store.begin_transaction()?;
        let old_bytes = txn.get(&primary_key)?;
        let old_entity = old_bytes.as_deref().map(|b| Entity::from_bytes(entity.pk(), b)).transpose()?;

        let new_bytes = entity.to_bytes()?;
        let mut batch = self.store.write_batch();
        batch.put(primary_key.clone(), new_bytes.clone());
        self.indexes.on_put(table, old_entity.as_ref(), entity, &mut batch)?;
        let value = serde_json::from_slice(&new_bytes).unwrap_or(serde_json::Value::Null);
        let seq = self.changefeed.append_event(
            &mut batch,
            EventType::Put,
            &format!("{table}:{}", entity.pk()),
            Some(value),
            json!({ "table": table }),
        )?;

        for (key, value) in batch.into_ops() {
            match value {
                Some(v) => txn.put(key, v),
                None => txn.delete(key),
            }
        }
        txn.commit()?;
        trace!(table, pk = entity.pk(), sequence = seq, "entity put committed");
        Ok(seq)
    }

    /// Deletes the entity at `pk` in `table`, maintaining every declared
    /// index and appending one `Delete` changefeed event. Returns `None`
    /// without touching anything if the entity does not exist.
    pub fn erase_entity(&self, table: &str, pk: &str) -> Result<Option<u64>> {
        let primary_key = keys::primary_key(table, pk);
        let mut txn = self.store.begin_transaction()?;
        let old_bytes = match txn.get(&primary_key)? {
            Some(b) => b,
            None => return Ok(None),
        };
        let old_entity = Entity::from_bytes(pk, &old_bytes)?;

        let mut batch = self.store.write_batch();
        batch.delete(primary_key.clone());
        self.indexes.on_erase(table, &old_entity, &mut batch)?;
        let seq =
            self.changefeed.append_event(&mut batch, EventType::Delete, &format!("{table}:{pk}"), None, json!({ "table": table }))?;

        for (key, value) in batch.into_ops() {
            match value {
                Some(v) => txn.put(key, v),
                None => txn.delete(key),
            }
        }
        txn.commit()?;
        trace!(table, pk, sequence = seq, "entity erase committed");
        Ok(Some(seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::common::error::ThemisError;
    use crate::core::common::types::Value;
    use crate::core::kv::StoreConfig;
    use crate::core::secondary_index::meta::IndexKind;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TxnCoordinator) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LsmKvStore::open(StoreConfig { db_path: dir.path().to_path_buf(), ..Default::default() }).unwrap());
        let indexes = Arc::new(SecondaryIndexManager::new(store.clone()));
        let changefeed = Arc::new(ChangefeedManager::new(store.clone()));
        (dir, TxnCoordinator::new(store, indexes, changefeed))
    }

    #[test]
    fn put_then_erase_round_trips_through_primary_and_changefeed() {
        let (_dir, coord) = setup();
        let mut e = Entity::new("u1").unwrap();
        e.set("name", Value::Text("alice".to_string()));
        let seq1 = coord.put_entity("users", &e).unwrap();
        assert_eq!(seq1, 1);

        let stored = coord.store.get(&keys::primary_key("users", "u1")).unwrap();
        assert!(stored.is_some());

        let seq2 = coord.erase_entity("users", "u1").unwrap().unwrap();
        assert_eq!(seq2, 2);
        assert!(coord.store.get(&keys::primary_key("users", "u1")).unwrap().is_none());

        let events = coord.changefeed.list_events(0, 10, None, None, 0).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn erasing_a_missing_entity_is_a_no_op() {
        let (_dir, coord) = setup();
        assert_eq!(coord.erase_entity("users", "ghost").unwrap(), None);
        assert_eq!(coord.changefeed.get_latest_sequence().unwrap(), 0);
    }

    #[test]
    fn put_maintains_declared_indexes_and_rejects_unique_violations() {
        let (_dir, coord) = setup();
        coord.indexes.declare_index("users", &["email"], IndexKind::Equality, true, None, None, None).unwrap();

        let mut e1 = Entity::new("u1").unwrap();
        e1.set("email", Value::Text("a@example.com".to_string()));
        coord.put_entity("users", &e1).unwrap();

        let mut e2 = Entity::new("u2").unwrap();
        e2.set("email", Value::Text("a@example.com".to_string()));
        let err = coord.put_entity("users", &e2).unwrap_err();
        assert!(matches!(err, ThemisError::UniqueViolation { .. }));

        let matches = coord.indexes.scan_keys_equal("users", "email", "a@example.com").unwrap();
        assert_eq!(matches, vec!["u1".to_string()]);
    }

    #[test]
    fn concurrent_read_then_write_surfaces_conflict_retryable() {
        let (_dir, coord) = setup();
        let mut e = Entity::new("u1").unwrap();
        e.set("name", Value::Text("alice".to_string()));
        coord.put_entity("users", &e).unwrap();

        // Simulate a racing writer mutating the same primary key between
        // this coordinator's read and its commit by writing directly to
        // the store after the transaction's snapshot would have been taken
        // via a manually driven transaction below.
        let mut txn = coord.store.begin_transaction().unwrap();
        txn.get(&keys::primary_key("users", "u1")).unwrap();
        coord.store.put(keys::primary_key("users", "u1"), b"{\"_pk\":\"u1\",\"name\":\"bob\"}".to_vec()).unwrap();
        txn.put(keys::primary_key("users", "u1"), b"{\"_pk\":\"u1\",\"name\":\"carol\"}".to_vec());
        assert!(matches!(txn.commit(), Err(ThemisError::ConflictRetryable)));
    }
}
