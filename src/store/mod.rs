use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{Record, StorageError};
use crate::query::QueryProvider;

// ============================================================================
// Backing Stores
// ============================================================================
//
// A Store answers queries (through its QueryProvider) and commits staged
// change sets. It never retries: a failed commit is returned to the caller
// exactly as the store reported it.
//
// - MemoryStore: in-process asynchronous store
// - PgStore:     PostgreSQL through sqlx
//
// ============================================================================

pub mod change_set;
pub mod memory;
pub mod postgres;
pub mod sql;

pub use change_set::{Change, ChangeSet, Staged};
pub use memory::MemoryStore;
pub use postgres::{PgStore, SqlRecord};

#[async_trait]
pub trait Store<T: Record>: Send + Sync {
    /// Provider used by every QueryHandle created over this store.
    fn provider(&self) -> Arc<dyn QueryProvider<T>>;

    /// Persist every staged change atomically. Returns the number of
    /// changes written.
    async fn commit(&self, changes: &ChangeSet<T>) -> Result<usize, StorageError>;
}
