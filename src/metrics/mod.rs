// Private module declaration
mod instrumented;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

use crate::model::{RepositoryError, StorageError};
use crate::query::ResultShape;

// Re-export for public API
pub use instrumented::InstrumentedProvider;

// ============================================================================
// Metrics Module - Prometheus metrics for data access
// ============================================================================
//
// Provides metrics for:
// - Terminal query executions per result shape (throughput, latency, failures)
// - Commits and commit failures
// - Staged mutations per kind
//
// Nothing here serves HTTP; callers gather `registry()` themselves.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Query Metrics
    pub queries_total: IntCounterVec,
    pub query_failures_total: IntCounterVec,
    pub query_duration: HistogramVec,

    // Unit-of-Work Metrics
    pub commits_total: IntCounter,
    pub commit_failures_total: IntCounterVec,
    pub staged_mutations_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        // Query Metrics
        let queries_total = IntCounterVec::new(
            Opts::new("record_store_queries_total", "Terminal query executions"),
            &["shape"],
        )?;
        registry.register(Box::new(queries_total.clone()))?;

        let query_failures_total = IntCounterVec::new(
            Opts::new("record_store_query_failures_total", "Terminal query executions that failed"),
            &["shape", "kind"],
        )?;
        registry.register(Box::new(query_failures_total.clone()))?;

        let query_duration = HistogramVec::new(
            HistogramOpts::new("record_store_query_duration_seconds", "Terminal query duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["shape"],
        )?;
        registry.register(Box::new(query_duration.clone()))?;

        // Unit-of-Work Metrics
        let commits_total = IntCounter::new("record_store_commits_total", "Successful commits")?;
        registry.register(Box::new(commits_total.clone()))?;

        let commit_failures_total = IntCounterVec::new(
            Opts::new("record_store_commit_failures_total", "Failed commits by storage error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(commit_failures_total.clone()))?;

        let staged_mutations_total = IntCounterVec::new(
            Opts::new("record_store_staged_mutations_total", "Mutations staged for commit"),
            &["kind"],
        )?;
        registry.register(Box::new(staged_mutations_total.clone()))?;

        Ok(Self {
            registry,
            queries_total,
            query_failures_total,
            query_duration,
            commits_total,
            commit_failures_total,
            staged_mutations_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a finished terminal query
    pub fn record_query(&self, shape: &ResultShape, duration_secs: f64, error: Option<&RepositoryError>) {
        let shape = shape.name();
        self.queries_total.with_label_values(&[shape]).inc();
        self.query_duration.with_label_values(&[shape]).observe(duration_secs);
        if let Some(error) = error {
            self.query_failures_total.with_label_values(&[shape, error.kind()]).inc();
        }
    }

    /// Helper to record a commit outcome
    pub fn record_commit(&self, error: Option<&StorageError>) {
        match error {
            None => self.commits_total.inc(),
            Some(error) => self.commit_failures_total.with_label_values(&[error.kind()]).inc(),
        }
    }

    /// Helper to record a staged mutation
    pub fn record_staged(&self, kind: &str) {
        self.staged_mutations_total.with_label_values(&[kind]).inc();
    }
}
