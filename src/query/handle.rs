use std::fmt;
use std::sync::Arc;

use futures_util::stream::BoxStream;

use crate::model::{Predicate, Record, RepositoryError, RepositoryResult};

use super::plan::{Direction, QueryOutput, QueryPlan, ResultShape};
use super::provider::QueryProvider;

// ============================================================================
// Query Handle - Lazy, Composable Query
// ============================================================================
//
// Lifecycle:
// - Built:         returned by `query()`; builders consume and return it
// - Materializing: a terminal operator took the handle by value
// - Materialized:  the result was returned; the handle no longer exists
//
// Ownership enforces the lifecycle: once a terminal operator runs there is
// no handle left to chain on. Clone a handle to run more than one terminal
// operator over the same description.
//
// ============================================================================

pub struct QueryHandle<T: Record> {
    provider: Arc<dyn QueryProvider<T>>,
    plan: QueryPlan,
}

impl<T: Record> Clone for QueryHandle<T> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            plan: self.plan.clone(),
        }
    }
}

impl<T: Record> fmt::Debug for QueryHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle").field("plan", &self.plan).finish()
    }
}

impl<T: Record> QueryHandle<T> {
    pub fn new(provider: Arc<dyn QueryProvider<T>>) -> Self {
        Self {
            provider,
            plan: QueryPlan::new(),
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    // ------------------------------------------------------------------
    // Builders (no side effects)
    // ------------------------------------------------------------------

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.plan.push_filter(predicate);
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: &str) -> Self {
        self.plan.order_by(field, Direction::Ascending);
        self
    }

    #[must_use]
    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.plan.order_by(field, Direction::Descending);
        self
    }

    #[must_use]
    pub fn then_by(mut self, field: &str) -> Self {
        self.plan.then_by(field, Direction::Ascending);
        self
    }

    #[must_use]
    pub fn then_by_desc(mut self, field: &str) -> Self {
        self.plan.then_by(field, Direction::Descending);
        self
    }

    #[must_use]
    pub fn skip(mut self, count: u64) -> Self {
        self.plan.add_skip(count);
        self
    }

    #[must_use]
    pub fn take(mut self, count: u64) -> Self {
        self.plan.limit_take(count);
        self
    }

    // ------------------------------------------------------------------
    // Terminal operators (each executes the composed plan exactly once)
    // ------------------------------------------------------------------

    async fn run(self, shape: ResultShape) -> RepositoryResult<QueryOutput<T>> {
        tracing::debug!(
            shape = %shape,
            filters = self.plan.filters().len(),
            sort_keys = self.plan.order().len(),
            skip = self.plan.skip(),
            take = ?self.plan.take(),
            "Materializing query"
        );
        self.provider.execute(&self.plan, &shape).await
    }

    pub async fn to_list(self) -> RepositoryResult<Vec<T>> {
        self.run(ResultShape::ToList).await?.into_list()
    }

    pub async fn first_or_default(self) -> RepositoryResult<Option<T>> {
        self.run(ResultShape::FirstOrDefault).await?.into_item()
    }

    pub async fn count(self) -> RepositoryResult<u64> {
        self.run(ResultShape::Count).await?.into_count()
    }

    pub async fn any(self) -> RepositoryResult<bool> {
        self.run(ResultShape::Any).await?.into_bool()
    }

    /// Exactly one record must match.
    pub async fn single(self) -> RepositoryResult<T> {
        self.run(ResultShape::Single)
            .await?
            .into_item()?
            .ok_or(RepositoryError::NoMatch)
    }

    pub async fn sum(self, field: &str) -> RepositoryResult<Option<f64>> {
        self.run(ResultShape::Sum(field.to_string())).await?.into_number()
    }

    pub async fn average(self, field: &str) -> RepositoryResult<Option<f64>> {
        self.run(ResultShape::Average(field.to_string()))
            .await?
            .into_number()
    }

    pub fn into_stream(self) -> BoxStream<'static, RepositoryResult<T>> {
        tracing::debug!(filters = self.plan.filters().len(), "Streaming query");
        self.provider.stream(self.plan)
    }
}
