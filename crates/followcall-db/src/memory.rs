//! In-process [`RecordStore`].

use crate::error::StoreError;
use crate::{Collection, RecordStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// A `RecordStore` held entirely in memory.
///
/// Each collection is a vector of `(id, body)` pairs so that listing keeps
/// insertion order.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: Mutex<HashMap<Collection, Vec<(String, Value)>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard
            .get(&collection)
            .and_then(|records| records.iter().find(|(rid, _)| rid == id))
            .map(|(_, body)| body.clone()))
    }

    fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let guard = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard
            .get(&collection)
            .map(|records| records.iter().map(|(_, body)| body.clone()).collect())
            .unwrap_or_default())
    }

    fn put(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError> {
        let mut guard = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        let records = guard.entry(collection).or_default();
        match records.iter_mut().find(|(rid, _)| rid == id) {
            Some((_, body)) => *body = record,
            None => records.push((id.to_string(), record)),
        }
        Ok(())
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let mut guard = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        let Some(records) = guard.get_mut(&collection) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|(rid, _)| rid != id);
        Ok(records.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_list_delete() {
        let store = MemoryRecordStore::new();
        store.put(Collection::Agents, "1", json!({"n": 1})).unwrap();
        store.put(Collection::Agents, "2", json!({"n": 2})).unwrap();
        store.put(Collection::Agents, "1", json!({"n": 3})).unwrap();

        assert_eq!(store.get(Collection::Agents, "1").unwrap(), Some(json!({"n": 3})));
        assert_eq!(
            store.list(Collection::Agents).unwrap(),
            vec![json!({"n": 3}), json!({"n": 2})]
        );
        assert!(store.delete(Collection::Agents, "2").unwrap());
        assert!(!store.delete(Collection::Calls, "2").unwrap());
        assert_eq!(store.list(Collection::Agents).unwrap().len(), 1);
    }
}
