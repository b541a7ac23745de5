use std::sync::Arc;

use crate::metrics::{InstrumentedProvider, Metrics};
use crate::model::{field, Predicate, Record, RepositoryError, RepositoryResult};
use crate::query::{QueryHandle, QueryPlan, ResultShape};
use crate::store::{ChangeSet, Staged, Store};

// ============================================================================
// Generic Repository - CRUD over any Record type
// ============================================================================
//
// Type Parameters:
// - `T`: the record type (must implement Record)
// - `S`: the backing store (must implement Store<T>)
//
// Responsibilities:
// 1. Identity lookup, eager reads and predicate reads
// 2. Stage inserts, updates and deletes in a ChangeSet
// 3. Commit staged changes in one save()
// 4. Hand out lazy QueryHandles over committed state
//
// One instance per logical request; it is never shared across callers.
//
// ============================================================================

pub struct Repository<T: Record, S: Store<T>> {
    store: S,
    changes: ChangeSet<T>,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Record, S: Store<T>> Repository<T, S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            changes: ChangeSet::new(),
            metrics: None,
        }
    }

    /// Record query, commit and staging metrics into `metrics`.
    pub fn with_metrics(store: S, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            changes: ChangeSet::new(),
            metrics: Some(metrics),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pending_changes(&self) -> &ChangeSet<T> {
        &self.changes
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Start a lazy pipeline over committed state.
    pub fn query(&self) -> QueryHandle<T> {
        let provider = self.store.provider();
        match &self.metrics {
            Some(metrics) => QueryHandle::new(Arc::new(InstrumentedProvider::new(
                provider,
                Arc::clone(metrics),
            ))),
            None => QueryHandle::new(provider),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Look up one record by identity. Absence is `Ok(None)`.
    pub async fn get_by_id(&self, id: &T::Id) -> RepositoryResult<Option<T>> {
        match self.changes.staged(id) {
            Some(Staged::Present(record)) => Ok(Some(record.clone())),
            Some(Staged::Removed) => Ok(None),
            None => {
                self.query()
                    .filter(field(T::ID_FIELD).eq(id.clone()))
                    .first_or_default()
                    .await
            }
        }
    }

    /// Every record, staged changes included. Unbounded; prefer a paged query.
    pub async fn get_all(&self) -> RepositoryResult<Vec<T>> {
        let committed = self.query().to_list().await?;
        Ok(self.changes.overlay(committed, &Predicate::True))
    }

    pub async fn find_by(&self, predicate: Predicate) -> RepositoryResult<Vec<T>> {
        let committed = self.query().filter(predicate.clone()).to_list().await?;
        Ok(self.changes.overlay(committed, &predicate))
    }

    /// Number of records matching `predicate`, staged changes included.
    /// Counted by the store, not by loading rows.
    pub async fn count(&self, predicate: Predicate) -> RepositoryResult<u64> {
        self.validate_predicate(&predicate, &ResultShape::Count)?;

        let staged = self.changes.count_present_matching(&predicate);
        let committed = self.committed_unstaged(predicate).count().await?;
        Ok(committed + staged)
    }

    /// Existence check answered by the store, not by loading rows.
    /// Agrees with `count(predicate) > 0`.
    pub async fn exists(&self, predicate: Predicate) -> RepositoryResult<bool> {
        self.validate_predicate(&predicate, &ResultShape::Any)?;

        if self.changes.count_present_matching(&predicate) > 0 {
            return Ok(true);
        }
        self.committed_unstaged(predicate).any().await
    }

    fn validate_predicate(&self, predicate: &Predicate, shape: &ResultShape) -> RepositoryResult<()> {
        let mut plan = QueryPlan::new();
        plan.push_filter(predicate.clone());
        plan.validate::<T>(shape)
    }

    /// Committed records matching `predicate` whose identity has no staged change.
    fn committed_unstaged(&self, predicate: Predicate) -> QueryHandle<T> {
        let staged = self.changes.staged_ids();
        let query = self.query().filter(predicate);
        if staged.is_empty() {
            return query;
        }
        query.filter(Predicate::all(
            staged.into_iter().map(|id| field(T::ID_FIELD).ne(id)),
        ))
    }

    // ========================================================================
    // Staged mutations
    // ========================================================================

    pub fn add(&mut self, record: T) {
        tracing::debug!(id = ?record.id(), "Staging insert");
        self.record_staged("insert");
        self.changes.insert(record);
    }

    pub fn add_range(&mut self, records: impl IntoIterator<Item = T>) {
        for record in records {
            self.add(record);
        }
    }

    pub fn update(&mut self, record: T) {
        tracing::debug!(id = ?record.id(), "Staging update");
        self.record_staged("update");
        self.changes.update(record);
    }

    pub fn delete(&mut self, record: T) {
        tracing::debug!(id = ?record.id(), "Staging delete");
        self.record_staged("delete");
        self.changes.delete(record);
    }

    pub fn delete_range(&mut self, records: impl IntoIterator<Item = T>) {
        for record in records {
            self.delete(record);
        }
    }

    /// Stage a delete for every record matching `predicate` right now.
    /// Returns how many were staged.
    pub async fn delete_where(&mut self, predicate: Predicate) -> RepositoryResult<usize> {
        let matches = self.find_by(predicate).await?;
        let count = matches.len();
        self.delete_range(matches);
        Ok(count)
    }

    /// Drop every staged change without committing.
    pub fn discard(&mut self) {
        if !self.changes.is_empty() {
            tracing::debug!(changes = self.changes.len(), "Discarding staged changes");
            self.changes.clear();
        }
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Persist every staged change. A failure leaves the changes staged and
    /// is returned exactly as the store reported it.
    pub async fn save(&mut self) -> RepositoryResult<usize> {
        if self.changes.is_empty() {
            return Ok(0);
        }

        let (inserts, updates, deletes) = self.changes.counts();

        match self.store.commit(&self.changes).await {
            Ok(written) => {
                tracing::info!(inserts, updates, deletes, written, "Saved changes");
                if let Some(metrics) = &self.metrics {
                    metrics.record_commit(None);
                }
                self.changes.clear();
                Ok(written)
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    kind = error.kind(),
                    pending = self.changes.len(),
                    "Save failed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_commit(Some(&error));
                }
                Err(RepositoryError::Storage(error))
            }
        }
    }

    fn record_staged(&self, kind: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_staged(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Supplier;
    use crate::model::StorageError;
    use crate::store::MemoryStore;

    fn seeded(count: i64) -> (MemoryStore<Supplier>, Repository<Supplier, MemoryStore<Supplier>>) {
        let store = MemoryStore::with_records((1..=count).map(Supplier::sample));
        let repository = Repository::new(store.clone());
        (store, repository)
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let (_, repository) = seeded(5);

        let found = repository.get_by_id(&3).await.unwrap();
        assert_eq!(found.map(|s| s.id), Some(3));

        assert!(repository.get_by_id(&99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_staged_insert_visible_before_save() {
        let (store, mut repository) = seeded(2);

        repository.add(Supplier::sample(10));

        assert!(repository.get_by_id(&10).await.unwrap().is_some());
        assert_eq!(repository.get_all().await.unwrap().len(), 3);
        assert!(repository.exists(field("id").eq(10)).await.unwrap());
        // lazy queries see committed state only
        assert_eq!(repository.query().count().await.unwrap(), 2);
        assert_eq!(store.len().await, 2);

        assert_eq!(repository.save().await.unwrap(), 1);
        assert_eq!(store.len().await, 3);
        assert!(!repository.has_pending_changes());
    }

    #[tokio::test]
    async fn test_staged_delete_hides_record() {
        let (_, mut repository) = seeded(3);
        let doomed = repository.get_by_id(&2).await.unwrap().unwrap();

        repository.delete(doomed);

        assert!(repository.get_by_id(&2).await.unwrap().is_none());
        assert!(!repository.exists(field("id").eq(2)).await.unwrap());
        let ids: Vec<i64> = repository.get_all().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_staged_update_changes_matches() {
        let (_, mut repository) = seeded(3);
        let mut renamed = repository.get_by_id(&1).await.unwrap().unwrap();
        renamed.name = "Acme".to_string();

        repository.update(renamed);

        let found = repository.find_by(field("name").eq("Acme")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(repository.find_by(field("name").eq("Supplier 1")).await.unwrap().is_empty());
        assert!(!repository.exists(field("name").eq("Supplier 1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_without_matches_is_empty() {
        let (_, repository) = seeded(4);

        let found = repository.find_by(field("country").eq("Atlantis")).await.unwrap();
        assert!(found.is_empty());
    }

    fn agreement_predicates() -> Vec<Predicate> {
        vec![
            Predicate::True,
            field("id").eq(10),
            field("id").eq(2),
            field("active").eq(true),
            field("rating").gt(4),
            field("rating").gt(10),
            field("name").eq("Renamed"),
            field("name").eq("Supplier 1"),
            field("id").between(3, 5) & field("active").eq(false),
        ]
    }

    async fn assert_exists_agrees_with_count(repository: &Repository<Supplier, MemoryStore<Supplier>>) {
        for predicate in agreement_predicates() {
            let exists = repository.exists(predicate.clone()).await.unwrap();
            let count = repository.count(predicate.clone()).await.unwrap();
            let found = repository.find_by(predicate.clone()).await.unwrap();
            assert_eq!(exists, count > 0, "{:?}", predicate);
            assert_eq!(count, found.len() as u64, "{:?}", predicate);
        }
    }

    #[tokio::test]
    async fn test_exists_agrees_with_count() {
        let (_, repository) = seeded(12);
        assert_exists_agrees_with_count(&repository).await;
        assert_eq!(
            repository.count(Predicate::True).await.unwrap(),
            repository.query().count().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_exists_agrees_with_count_with_pending_changes() {
        let (_, mut repository) = seeded(3);
        repository.add(Supplier::sample(10));
        let mut renamed = Supplier::sample(1);
        renamed.name = "Renamed".to_string();
        repository.update(renamed);
        repository.delete(Supplier::sample(2));

        assert_exists_agrees_with_count(&repository).await;
        assert_eq!(repository.count(field("id").eq(10)).await.unwrap(), 1);
        assert_eq!(repository.count(field("id").eq(2)).await.unwrap(), 0);
        assert_eq!(repository.count(Predicate::True).await.unwrap(), 3);
        // a staged insert of a committed identity replaces it rather than adding one
        repository.add(Supplier::sample(3));
        assert_eq!(repository.count(Predicate::True).await.unwrap(), 3);
        assert_exists_agrees_with_count(&repository).await;
    }

    #[tokio::test]
    async fn test_exists_rejects_unknown_field() {
        let (_, mut repository) = seeded(1);
        repository.add(Supplier::sample(2));

        let result = repository.exists(field("password").eq("x")).await;
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_where() {
        let (store, mut repository) = seeded(9);

        let staged = repository.delete_where(field("active").eq(false)).await.unwrap();
        assert_eq!(staged, 3);
        repository.save().await.unwrap();

        assert_eq!(store.len().await, 6);
        assert!(!repository.exists(field("active").eq(false)).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_without_changes() {
        let (_, mut repository) = seeded(1);
        assert_eq!(repository.save().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_changes_staged() {
        let (store, mut repository) = seeded(1);
        repository.add(Supplier::sample(2));
        store.fail_next_commit(StorageError::Connection("connection reset".into()));

        let error = repository.save().await.unwrap_err();
        assert!(matches!(
            error,
            RepositoryError::Storage(StorageError::Connection(ref message)) if message == "connection reset"
        ));
        assert_eq!(repository.pending_changes().len(), 1);
        assert_eq!(store.len().await, 1);

        // the caller decides to retry
        assert_eq!(repository.save().await.unwrap(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_constraint_violation_surfaces() {
        let (store, mut repository) = seeded(2);
        repository.add(Supplier::sample(2));

        let error = repository.save().await.unwrap_err();
        assert!(matches!(error, RepositoryError::Storage(StorageError::Constraint(_))));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let store = MemoryStore::with_records((1..=3).map(Supplier::sample));
        let mut repository = Repository::with_metrics(store, Arc::clone(&metrics));

        repository.add(Supplier::sample(4));
        repository.delete(Supplier::sample(1));
        repository.save().await.unwrap();
        repository.query().count().await.unwrap();

        assert_eq!(metrics.commits_total.get(), 1);
        assert_eq!(metrics.staged_mutations_total.with_label_values(&["insert"]).get(), 1);
        assert_eq!(metrics.staged_mutations_total.with_label_values(&["delete"]).get(), 1);
        assert_eq!(metrics.queries_total.with_label_values(&["count"]).get(), 1);
    }
}
