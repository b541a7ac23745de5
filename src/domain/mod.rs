// ============================================================================
// Domain Layer - Concrete Record Types
// ============================================================================
//
// Record types stored through the generic repository. Each one implements
// Record (identity + field access) and, when it lives in PostgreSQL,
// SqlRecord (table name + row decoding).
//
// ============================================================================

pub mod supplier;

pub use supplier::{Supplier, SUPPLIERS_SCHEMA};
