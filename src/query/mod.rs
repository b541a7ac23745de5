// ============================================================================
// Query - Lazy Predicate Pipeline
// ============================================================================
//
// - plan:     declarative filter / order / window description + result shapes
// - handle:   the caller-facing QueryHandle with builders and terminal operators
// - provider: the async execution seam every backing store implements
// - pipeline: synchronous evaluation over resident records
//
// ============================================================================

pub mod handle;
pub mod pipeline;
pub mod plan;
pub mod provider;

pub use handle::QueryHandle;
pub use plan::{Direction, QueryOutput, QueryPlan, ResultShape, SortKey};
pub use provider::{buffered_stream, QueryProvider};
