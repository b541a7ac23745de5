// ============================================================================
// Repository Layer - Generic Data Access
// ============================================================================
//
// This module contains GENERIC data-access infrastructure.
// All components work with ANY Record type and ANY Store.
//
// - Repository: CRUD, predicate reads, staged mutations, save()
// - Service:    unit-of-work wrapper that commits every write
//
// ============================================================================

pub mod record_repository;
pub mod service;

pub use record_repository::Repository;
pub use service::Service;
