//! Typed access to the record collections.

use crate::error::StoreError;
use crate::{Collection, RecordStore};
use followcall_types::{Agent, Call};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A type that lives in one of the record collections.
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn record_id(&self) -> &str;
}

impl Record for Agent {
    const COLLECTION: Collection = Collection::Agents;

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Record for Call {
    const COLLECTION: Collection = Collection::Calls;

    fn record_id(&self) -> &str {
        &self.id
    }
}

pub fn get_record<R: Record>(store: &dyn RecordStore, id: &str) -> Result<Option<R>, StoreError> {
    store
        .get(R::COLLECTION, id)?
        .map(|value| serde_json::from_value(value).map_err(StoreError::from))
        .transpose()
}

/// Lists a collection in insertion order.
///
/// Bodies that no longer decode are skipped with a warning rather than
/// failing the whole listing.
pub fn list_records<R: Record>(store: &dyn RecordStore) -> Result<Vec<R>, StoreError> {
    let mut out = Vec::new();
    for value in store.list(R::COLLECTION)? {
        match serde_json::from_value(value) {
            Ok(record) => out.push(record),
            Err(e) => {
                tracing::warn!(
                    collection = R::COLLECTION.as_str(),
                    "skipping undecodable record: {}",
                    e
                );
            }
        }
    }
    Ok(out)
}

pub fn put_record<R: Record>(store: &dyn RecordStore, record: &R) -> Result<(), StoreError> {
    let value = serde_json::to_value(record)?;
    store.put(R::COLLECTION, record.record_id(), value)
}

pub fn delete_record<R: Record>(store: &dyn RecordStore, id: &str) -> Result<bool, StoreError> {
    store.delete(R::COLLECTION, id)
}

/// Upserts an agent.
///
/// When an agent with the same id already exists, its `created_at` is kept
/// and `updated_at` is refreshed; a new agent is stored as given. Returns
/// the agent as stored.
pub fn save_agent(store: &dyn RecordStore, agent: Agent) -> Result<Agent, StoreError> {
    let mut agent = agent;
    if let Some(existing) = get_record::<Agent>(store, &agent.id)? {
        agent.created_at = existing.created_at;
        let now = followcall_types::now();
        // Keep updated_at strictly increasing even when two saves land in the
        // same millisecond.
        agent.updated_at = if now > existing.updated_at {
            now
        } else {
            existing.updated_at + chrono::TimeDelta::milliseconds(1)
        };
    }
    put_record(store, &agent)?;
    Ok(agent)
}

/// All calls owned by `agent_id`, in insertion order.
pub fn calls_for_agent(store: &dyn RecordStore, agent_id: &str) -> Result<Vec<Call>, StoreError> {
    Ok(list_records::<Call>(store)?
        .into_iter()
        .filter(|c| c.agent_id == agent_id)
        .collect())
}
