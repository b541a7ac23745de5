use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio::sync::RwLock;

use crate::model::{Record, RepositoryResult, StorageError};
use crate::query::pipeline;
use crate::query::{buffered_stream, QueryOutput, QueryPlan, QueryProvider, ResultShape};

use super::change_set::{Change, ChangeSet};
use super::Store;

// ============================================================================
// In-Memory Store
// ============================================================================
//
// An in-process asynchronous store. Reads wait on a shared read lock and
// commits on the write lock; a commit validates the whole change set before
// applying any of it, so it either lands completely or not at all.
//
// Cloning is cheap and every clone sees the same rows.
//
// ============================================================================

pub struct MemoryStore<T: Record> {
    rows: Arc<RwLock<Vec<T>>>,
    next_commit_failure: Arc<Mutex<Option<StorageError>>>,
}

impl<T: Record> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            next_commit_failure: Arc::clone(&self.next_commit_failure),
        }
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Seed the store with already-committed records.
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(records.into_iter().collect())),
            next_commit_failure: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn snapshot(&self) -> Vec<T> {
        self.rows.read().await.clone()
    }

    /// Make the next commit fail with `error` without touching any rows.
    pub fn fail_next_commit(&self, error: StorageError) {
        let mut slot = self
            .next_commit_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(error);
    }

    fn take_injected_failure(&self) -> Option<StorageError> {
        self.next_commit_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn describe<T: Record>(record: &T) -> String {
    format!("{} = {:?}", T::ID_FIELD, record.id())
}

/// Check the change set against current identities without mutating rows.
fn validate_changes<T: Record>(rows: &[T], changes: &ChangeSet<T>) -> Result<(), StorageError> {
    let mut ids: HashSet<T::Id> = rows.iter().map(Record::id).collect();

    for change in changes.iter() {
        let id = change.record().id();
        let valid = match change {
            Change::Insert(_) => ids.insert(id),
            Change::Update(_) => ids.contains(&id),
            Change::Delete(_) => ids.remove(&id),
        };

        if !valid {
            let record = describe(change.record());
            return Err(match change {
                Change::Insert(_) => StorageError::Constraint(format!("duplicate identity {}", record)),
                _ => StorageError::Missing(format!("cannot {} {}", change.kind(), record)),
            });
        }
    }

    Ok(())
}

#[async_trait]
impl<T: Record> QueryProvider<T> for MemoryStore<T> {
    async fn execute(&self, plan: &QueryPlan, shape: &ResultShape) -> RepositoryResult<QueryOutput<T>> {
        plan.validate::<T>(shape)?;
        let rows = self.rows.read().await;

        let output = match shape {
            ResultShape::ToList => QueryOutput::List(pipeline::to_list(&rows, plan)),
            ResultShape::FirstOrDefault => QueryOutput::Item(pipeline::first_or_default(&rows, plan)),
            ResultShape::Count => QueryOutput::Count(pipeline::count(&rows, plan)),
            ResultShape::Any => QueryOutput::Bool(pipeline::any(&rows, plan)),
            ResultShape::Single => QueryOutput::Item(Some(pipeline::single(&rows, plan)?)),
            ResultShape::Sum(field) => QueryOutput::Number(pipeline::sum(&rows, plan, field)?),
            ResultShape::Average(field) => QueryOutput::Number(pipeline::average(&rows, plan, field)?),
        };

        Ok(output)
    }

    fn stream(&self, plan: QueryPlan) -> BoxStream<'static, RepositoryResult<T>> {
        buffered_stream(Arc::new(self.clone()), plan)
    }
}

#[async_trait]
impl<T: Record> Store<T> for MemoryStore<T> {
    fn provider(&self) -> Arc<dyn QueryProvider<T>> {
        Arc::new(self.clone())
    }

    async fn commit(&self, changes: &ChangeSet<T>) -> Result<usize, StorageError> {
        if let Some(error) = self.take_injected_failure() {
            return Err(error);
        }

        let mut rows = self.rows.write().await;
        validate_changes(&rows, changes)?;

        for change in changes.iter() {
            match change {
                Change::Insert(record) => rows.push(record.clone()),
                Change::Update(record) => {
                    if let Some(row) = rows.iter_mut().find(|row| row.same_identity(record)) {
                        *row = record.clone();
                    }
                }
                Change::Delete(record) => rows.retain(|row| !row.same_identity(record)),
            }
        }

        Ok(changes.len())
    }
}
