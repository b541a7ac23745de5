use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::FromRow;

use crate::config::StoreConfig;
use crate::model::{Record, RepositoryError, RepositoryResult, StorageError, Value};
use crate::query::{buffered_stream, QueryOutput, QueryPlan, QueryProvider, ResultShape};

use super::change_set::{Change, ChangeSet};
use super::sql::{self, SqlStatement};
use super::Store;

// ============================================================================
// PostgreSQL Store (sqlx)
// ============================================================================
//
// Live asynchronous store for any record that maps to one table.
//
// Every terminal shape is supported, including aggregates. Commits run in a
// single transaction; an update or delete that touches no row aborts the
// whole commit with StorageError::Missing.
//
// ============================================================================

/// A record persisted as one row of `TABLE`, columns named after `FIELDS`.
pub trait SqlRecord: Record + for<'r> FromRow<'r, PgRow> {
    const TABLE: &'static str;
}

/// Bind every parameter of a rendered statement, in order.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params.iter() {
            query = match param {
                // rendered as a literal, never bound
                Value::Null => query,
                Value::Bool(v) => query.bind(*v),
                Value::Int(v) => query.bind(*v),
                Value::Float(v) => query.bind(*v),
                Value::Text(v) => query.bind(v.clone()),
                Value::Uuid(v) => query.bind(*v),
                Value::Timestamp(v) => query.bind(*v),
            };
        }
        query
    }};
}

/// Map a sqlx failure onto the storage taxonomy.
pub fn storage_error(error: sqlx::Error) -> StorageError {
    match &error {
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() =>
        {
            StorageError::Constraint(db.message().to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StorageError::Connection(error.to_string())
        }
        _ => StorageError::Database(error.to_string()),
    }
}

pub struct PgStore<T> {
    pool: PgPool,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for PgStore<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: SqlRecord> PgStore<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    pub async fn connect(config: &StoreConfig) -> RepositoryResult<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| RepositoryError::validation("no database url configured"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await
            .map_err(storage_error)?;

        tracing::info!(
            table = T::TABLE,
            max_connections = config.max_connections,
            "Connected PostgreSQL store"
        );

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_rows(&self, statement: &SqlStatement) -> RepositoryResult<Vec<T>> {
        let query = bind_params!(sqlx::query_as::<Postgres, T>(&statement.text), statement.params);
        let rows = query.fetch_all(&self.pool).await.map_err(storage_error)?;
        Ok(rows)
    }

    async fn fetch_count(&self, statement: &SqlStatement) -> RepositoryResult<u64> {
        let query = bind_params!(sqlx::query_scalar::<Postgres, i64>(&statement.text), statement.params);
        let count = query.fetch_one(&self.pool).await.map_err(storage_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn fetch_exists(&self, statement: &SqlStatement) -> RepositoryResult<bool> {
        let query = bind_params!(sqlx::query_scalar::<Postgres, bool>(&statement.text), statement.params);
        Ok(query.fetch_one(&self.pool).await.map_err(storage_error)?)
    }

    async fn fetch_number(&self, statement: &SqlStatement) -> RepositoryResult<Option<f64>> {
        let query = bind_params!(
            sqlx::query_scalar::<Postgres, Option<f64>>(&statement.text),
            statement.params
        );
        Ok(query.fetch_one(&self.pool).await.map_err(storage_error)?)
    }
}

#[async_trait]
impl<T: SqlRecord> QueryProvider<T> for PgStore<T> {
    async fn execute(&self, plan: &QueryPlan, shape: &ResultShape) -> RepositoryResult<QueryOutput<T>> {
        plan.validate::<T>(shape)?;
        let statement = sql::select_statement::<T>(T::TABLE, plan, shape)?;

        tracing::debug!(
            shape = %shape,
            sql = %statement.text,
            params = statement.params.len(),
            "Executing query"
        );

        let output = match shape {
            ResultShape::ToList => QueryOutput::List(self.fetch_rows(&statement).await?),
            ResultShape::FirstOrDefault => {
                QueryOutput::Item(self.fetch_rows(&statement).await?.into_iter().next())
            }
            ResultShape::Single => {
                let mut rows = self.fetch_rows(&statement).await?;
                match rows.len() {
                    0 => return Err(RepositoryError::NoMatch),
                    1 => QueryOutput::Item(rows.pop()),
                    _ => return Err(RepositoryError::MultipleMatches),
                }
            }
            ResultShape::Count => QueryOutput::Count(self.fetch_count(&statement).await?),
            ResultShape::Any => QueryOutput::Bool(self.fetch_exists(&statement).await?),
            ResultShape::Sum(_) | ResultShape::Average(_) => {
                QueryOutput::Number(self.fetch_number(&statement).await?)
            }
        };

        Ok(output)
    }

    fn stream(&self, plan: QueryPlan) -> BoxStream<'static, RepositoryResult<T>> {
        buffered_stream(Arc::new(self.clone()), plan)
    }
}

#[async_trait]
impl<T: SqlRecord> Store<T> for PgStore<T> {
    fn provider(&self) -> Arc<dyn QueryProvider<T>> {
        Arc::new(self.clone())
    }

    async fn commit(&self, changes: &ChangeSet<T>) -> Result<usize, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        for change in changes.iter() {
            let statement = match change {
                Change::Insert(record) => sql::insert_statement(T::TABLE, record),
                Change::Update(record) => sql::update_statement(T::TABLE, record),
                Change::Delete(record) => sql::delete_statement(T::TABLE, record),
            };

            let result = bind_params!(sqlx::query::<Postgres>(&statement.text), statement.params)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;

            if result.rows_affected() == 0 {
                // dropping the transaction rolls it back
                return Err(StorageError::Missing(format!(
                    "cannot {} {} {} = {:?}",
                    change.kind(),
                    T::TABLE,
                    T::ID_FIELD,
                    change.record().id()
                )));
            }
        }

        tx.commit().await.map_err(storage_error)?;

        tracing::debug!(table = T::TABLE, changes = changes.len(), "Committed transaction");
        Ok(changes.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
