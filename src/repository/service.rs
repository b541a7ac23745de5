use crate::model::{Predicate, Record, RepositoryResult};
use crate::query::QueryHandle;
use crate::store::Store;

use super::Repository;

// ============================================================================
// Service - Unit of Work over a Repository
// ============================================================================
//
// Reads are pure pass-through. Every write stages exactly one mutation and
// commits it immediately, so a caller can never forget to flush.
//
// If the commit fails the staged mutation is discarded before the error is
// returned, leaving the Service clean for a retry of the whole operation.
//
// ============================================================================

pub struct Service<T: Record, S: Store<T>> {
    repository: Repository<T, S>,
}

impl<T: Record, S: Store<T>> Service<T, S> {
    pub fn new(repository: Repository<T, S>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Repository<T, S> {
        &self.repository
    }

    pub fn into_repository(self) -> Repository<T, S> {
        self.repository
    }

    // Reads

    pub async fn get_by_id(&self, id: &T::Id) -> RepositoryResult<Option<T>> {
        self.repository.get_by_id(id).await
    }

    pub async fn get_all(&self) -> RepositoryResult<Vec<T>> {
        self.repository.get_all().await
    }

    pub fn query(&self) -> QueryHandle<T> {
        self.repository.query()
    }

    pub async fn find_by(&self, predicate: Predicate) -> RepositoryResult<Vec<T>> {
        self.repository.find_by(predicate).await
    }

    pub async fn count(&self, predicate: Predicate) -> RepositoryResult<u64> {
        self.repository.count(predicate).await
    }

    pub async fn exists(&self, predicate: Predicate) -> RepositoryResult<bool> {
        self.repository.exists(predicate).await
    }

    // Writes

    /// Insert and commit. Returns the stored record.
    pub async fn create(&mut self, record: T) -> RepositoryResult<T> {
        self.repository.add(record.clone());
        self.commit().await?;
        Ok(record)
    }

    /// Update and commit. Returns the stored record.
    pub async fn modify(&mut self, record: T) -> RepositoryResult<T> {
        self.repository.update(record.clone());
        self.commit().await?;
        Ok(record)
    }

    /// Delete and commit.
    pub async fn remove(&mut self, record: T) -> RepositoryResult<()> {
        self.repository.delete(record);
        self.commit().await?;
        Ok(())
    }

    async fn commit(&mut self) -> RepositoryResult<usize> {
        let result = self.repository.save().await;
        if result.is_err() {
            self.repository.discard();
        }
        result
    }
}
