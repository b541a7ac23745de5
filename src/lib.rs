// ============================================================================
// record_store - Generic Data Access over Any Record Type
// ============================================================================
//
// Layers, leaf-first:
// - model:      Record capability, values, predicates, errors
// - query:      lazy QueryHandle, plans, result shapes, provider seam
// - store:      change sets plus the in-memory and PostgreSQL stores
// - adapter:    async query execution over resident data (test fixtures)
// - repository: Repository (CRUD + unit of work) and Service
// - paging:     Pager and PagedResult
// - metrics:    Prometheus instrumentation
// - config:     application configuration
// - utils:      caller-side retry
// - domain:     concrete record types
//
// ============================================================================

pub mod adapter;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod model;
pub mod paging;
pub mod query;
pub mod repository;
pub mod store;
pub mod utils;

pub use adapter::AsyncQueryAdapter;
pub use model::{field, Predicate, Record, RepositoryError, RepositoryResult, StorageError, Value};
pub use paging::{PageRequest, PagedResult, Pager};
pub use query::QueryHandle;
pub use repository::{Repository, Service};
pub use store::{MemoryStore, PgStore, Store};
