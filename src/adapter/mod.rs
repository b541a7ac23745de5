// ============================================================================
// Adapter - Async Query Execution over Resident Data
// ============================================================================
//
// Lets query-composing code be tested without a real store: the adapter
// speaks the same QueryProvider contract as the live stores.
//
// ============================================================================

pub mod async_query;

pub use async_query::AsyncQueryAdapter;
