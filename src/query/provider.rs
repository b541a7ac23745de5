use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use crate::model::{Record, RepositoryError, RepositoryResult};

use super::plan::{QueryOutput, QueryPlan, ResultShape};

// ============================================================================
// Query Provider - Execution Seam
// ============================================================================
//
// Separates "what to fetch" (QueryPlan) from "how it is fetched". A terminal
// operator on a QueryHandle resolves to exactly one `execute` call, selected
// by the shape of the result it wants.
//
// Implementations:
// - MemoryStore / PgStore: the live asynchronous stores
// - AsyncQueryAdapter: resident test fixtures, already-completed results
// - InstrumentedProvider: metrics decorator around any of the above
//
// ============================================================================

#[async_trait]
pub trait QueryProvider<T: Record>: Send + Sync {
    /// Execute the plan once and answer in the requested shape.
    async fn execute(&self, plan: &QueryPlan, shape: &ResultShape) -> RepositoryResult<QueryOutput<T>>;

    /// Element-by-element asynchronous enumeration of the plan's results.
    fn stream(&self, plan: QueryPlan) -> BoxStream<'static, RepositoryResult<T>>;
}

/// Stream built on a single list execution, for providers that cannot hold
/// a cursor open beyond one call.
pub fn buffered_stream<T: Record>(
    provider: Arc<dyn QueryProvider<T>>,
    plan: QueryPlan,
) -> BoxStream<'static, RepositoryResult<T>> {
    stream::once(async move {
        provider
            .execute(&plan, &ResultShape::ToList)
            .await
            .and_then(QueryOutput::into_list)
    })
    .map(|result| match result {
        Ok(items) => stream::iter(items.into_iter().map(Ok::<T, RepositoryError>)).left_stream(),
        Err(error) => stream::iter(std::iter::once(Err(error))).right_stream(),
    })
    .flatten()
    .boxed()
}
