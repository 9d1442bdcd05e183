use thiserror::Error;

use crate::post::PostError;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A required field is missing or malformed. Caused by the caller.
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    /// The pagination token could not be decoded. Caused by the caller.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    /// A stored item does not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
    /// An atomic multi-item write was rejected; nothing was written.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    /// At least one of the concurrent count queries failed.
    #[error("Aggregation failed: {0}")]
    AggregationFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl RepositoryError {
    /// True for errors caused by the request itself. These are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RepositoryError::Validation(_)
                | RepositoryError::InvalidCursor(_)
                | RepositoryError::NotFound { .. }
        )
    }
}

impl From<PostError> for RepositoryError {
    fn from(err: PostError) -> Self {
        RepositoryError::Validation(err.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
