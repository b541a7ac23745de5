use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use crate::model::{Record, RepositoryError, RepositoryResult};
use crate::query::pipeline;
use crate::query::{QueryHandle, QueryOutput, QueryPlan, QueryProvider, ResultShape};

// ============================================================================
// Async Query Adapter
// ============================================================================
//
// Serves the asynchronous QueryProvider contract from a finite, resident
// sequence of records. Query-composing code written against a live store
// runs unchanged over an adapter-backed QueryHandle.
//
// Supported result shapes form a closed set:
//   to_list, first_or_default, count, any, single
//
// Each shape maps directly onto the matching synchronous pipeline function.
// The result is returned from a future that completes on its first poll:
// the data is already resident, so nothing ever waits.
//
// Any other shape fails with UnsupportedOperation. It never degrades to a
// default value, so a new query shape that lacks adapter coverage shows up
// as a failing test instead of a silently wrong one.
//
// ============================================================================

pub struct AsyncQueryAdapter<T: Record> {
    items: Arc<Vec<T>>,
}

impl<T: Record> Clone for AsyncQueryAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T: Record> AsyncQueryAdapter<T> {
    /// Names of the result shapes this adapter can answer.
    pub const SUPPORTED_SHAPES: &'static [&'static str] =
        &["to_list", "first_or_default", "count", "any", "single"];

    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: Arc::new(items.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A fresh query handle over the resident records.
    pub fn query(&self) -> QueryHandle<T> {
        QueryHandle::new(Arc::new(self.clone()))
    }

    /// Synchronous resolution of a terminal call.
    pub fn resolve(&self, plan: &QueryPlan, shape: &ResultShape) -> RepositoryResult<QueryOutput<T>> {
        plan.validate::<T>(shape)?;
        let items = self.items.as_slice();

        let output = match shape {
            ResultShape::ToList => QueryOutput::List(pipeline::to_list(items, plan)),
            ResultShape::FirstOrDefault => QueryOutput::Item(pipeline::first_or_default(items, plan)),
            ResultShape::Count => QueryOutput::Count(pipeline::count(items, plan)),
            ResultShape::Any => QueryOutput::Bool(pipeline::any(items, plan)),
            ResultShape::Single => QueryOutput::Item(Some(pipeline::single(items, plan)?)),
            unsupported => {
                tracing::warn!(shape = %unsupported, "Async query adapter has no terminal operator for shape");
                return Err(RepositoryError::unsupported(format!(
                    "the async query adapter cannot execute '{}' (supported: {})",
                    unsupported,
                    Self::SUPPORTED_SHAPES.join(", ")
                )));
            }
        };

        Ok(output)
    }
}

#[async_trait]
impl<T: Record> QueryProvider<T> for AsyncQueryAdapter<T> {
    async fn execute(&self, plan: &QueryPlan, shape: &ResultShape) -> RepositoryResult<QueryOutput<T>> {
        self.resolve(plan, shape)
    }

    fn stream(&self, plan: QueryPlan) -> BoxStream<'static, RepositoryResult<T>> {
        match self
            .resolve(&plan, &ResultShape::ToList)
            .and_then(QueryOutput::into_list)
        {
            Ok(items) => stream::iter(items.into_iter().map(Ok::<T, RepositoryError>)).boxed(),
            Err(error) => stream::iter(std::iter::once(Err(error))).boxed(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
