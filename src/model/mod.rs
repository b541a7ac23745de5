// ============================================================================
// Model - Generic Record Abstractions
// ============================================================================
//
// Entity-agnostic building blocks shared by every layer:
// - Record capability (identity + field access)
// - Field values and their comparison rules
// - Predicates (tagged filter expressions)
// - Error taxonomy
//
// No entity-specific code lives here.
//
// ============================================================================

pub mod errors;
pub mod predicate;
pub mod record;
pub mod value;

pub use errors::{RepositoryError, RepositoryResult, StorageError};
pub use predicate::{field, CompareOp, FieldRef, Operand, Predicate};
pub use record::Record;
pub use value::Value;
