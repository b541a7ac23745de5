use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::model::{Record, RepositoryResult};
use crate::query::{QueryOutput, QueryPlan, QueryProvider, ResultShape};

use super::Metrics;

/// Records count, latency and failures of every terminal query it forwards.
pub struct InstrumentedProvider<T: Record> {
    inner: Arc<dyn QueryProvider<T>>,
    metrics: Arc<Metrics>,
}

impl<T: Record> InstrumentedProvider<T> {
    pub fn new(inner: Arc<dyn QueryProvider<T>>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<T: Record> QueryProvider<T> for InstrumentedProvider<T> {
    async fn execute(&self, plan: &QueryPlan, shape: &ResultShape) -> RepositoryResult<QueryOutput<T>> {
        let started = Instant::now();
        let result = self.inner.execute(plan, shape).await;
        self.metrics
            .record_query(shape, started.elapsed().as_secs_f64(), result.as_ref().err());
        result
    }

    fn stream(&self, plan: QueryPlan) -> BoxStream<'static, RepositoryResult<T>> {
        self.metrics.queries_total.with_label_values(&["stream"]).inc();
        self.inner.stream(plan)
    }
}
