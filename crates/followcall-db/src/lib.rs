//! Record store for the followcall workspace.
//!
//! Agents and calls are persisted as JSON documents in two collections,
//! addressed by id and listed in insertion order. The [`RecordStore`] trait
//! is the seam the server and call workflow depend on; two implementations
//! are provided:
//!
//! - [`SqliteRecordStore`]: SQLite with WAL mode behind an `r2d2` pool, with
//!   the schema created through embedded, versioned migrations.
//! - [`MemoryRecordStore`]: a process-local map, used by tests and by
//!   short-lived tools that do not need durability.
//!
//! All operations are synchronous. There are no transactions across
//! records; the last write wins.

mod error;
mod memory;
mod migrations;
mod pool;
mod records;
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryRecordStore;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError, IN_MEMORY};
pub use records::{
    calls_for_agent, delete_record, get_record, list_records, put_record, save_agent, Record,
};
pub use sqlite::SqliteRecordStore;

use serde_json::Value;
use std::fmt;

/// The two record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Agents,
    Calls,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agents => "agents",
            Self::Calls => "calls",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value persistence for JSON records.
///
/// Implementations must list records in first-insertion order; re-putting an
/// existing id replaces its body without moving it.
pub trait RecordStore: Send + Sync {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;

    fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    /// Inserts or replaces the record stored under `id`.
    fn put(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError>;

    /// Removes the record. Returns whether a record was removed.
    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;
}
