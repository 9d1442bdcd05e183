//! Pure functions for mapping repository errors to HTTP status codes.

use super::RepositoryError;

/// Maps a [`RepositoryError`] to an HTTP status code.
///
/// - `Validation` -> 400 (Bad Request)
/// - `InvalidCursor` -> 400 (Bad Request)
/// - `NotFound` -> 404 (Not Found)
/// - `Decode` -> 500 (Internal Server Error)
/// - `TransactionFailed` -> 500 (Internal Server Error)
/// - `AggregationFailed` -> 500 (Internal Server Error)
/// - `QueryFailed` -> 500 (Internal Server Error)
/// - `ConnectionFailed` -> 503 (Service Unavailable)
///
/// # Examples
///
/// ```
/// use blogsync_core::storage::{RepositoryError, repository_error_to_status_code};
///
/// let error = RepositoryError::NotFound {
///     entity_type: "Post",
///     id: "hello-world".to_string(),
/// };
/// assert_eq!(repository_error_to_status_code(&error), 404);
/// ```
pub fn repository_error_to_status_code(error: &RepositoryError) -> u16 {
    match error {
        RepositoryError::Validation(_) => 400,
        RepositoryError::InvalidCursor(_) => 400,
        RepositoryError::NotFound { .. } => 404,
        RepositoryError::Decode(_) => 500,
        RepositoryError::TransactionFailed(_) => 500,
        RepositoryError::AggregationFailed(_) => 500,
        RepositoryError::QueryFailed(_) => 500,
        RepositoryError::ConnectionFailed(_) => 503,
    }
}
