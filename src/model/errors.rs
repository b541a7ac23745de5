// ============================================================================
// Repository Errors
// ============================================================================
//
// A missed identity lookup is not an error: it is `Ok(None)`.
//
// ============================================================================

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Unsupported terminal operation: {0}")]
    UnsupportedOperation(String),

    #[error("Sequence contains no matching record")]
    NoMatch,

    #[error("Sequence contains more than one matching record")]
    MultipleMatches,
}

impl RepositoryError {
    pub fn validation(message: impl Into<String>) -> Self {
        RepositoryError::Validation(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        RepositoryError::UnsupportedOperation(message.into())
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryError::Validation(_) => "validation",
            RepositoryError::Storage(e) => e.kind(),
            RepositoryError::UnsupportedOperation(_) => "unsupported",
            RepositoryError::NoMatch => "no_match",
            RepositoryError::MultipleMatches => "multiple_matches",
        }
    }

    /// Only connection-class storage failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Storage(StorageError::Connection(_)))
    }
}

// ============================================================================
// Storage Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Record missing from store: {0}")]
    Missing(String),

    #[error("Connection failure: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::Constraint(_) => "constraint",
            StorageError::Missing(_) => "missing",
            StorageError::Connection(_) => "connection",
            StorageError::Database(_) => "database",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_is_wrapped_transparently() {
        let storage = StorageError::Constraint("duplicate key".to_string());
        let error: RepositoryError = storage.clone().into();

        assert_eq!(error.to_string(), storage.to_string());
        assert_eq!(error.kind(), "constraint");
    }

    #[test]
    fn test_only_connection_failures_are_transient() {
        assert!(RepositoryError::from(StorageError::Connection("reset".into())).is_transient());
        assert!(!RepositoryError::from(StorageError::Missing("1".into())).is_transient());
        assert!(!RepositoryError::validation("page size").is_transient());
        assert!(!RepositoryError::unsupported("average").is_transient());
    }
}
