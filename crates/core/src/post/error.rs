use thiserror::Error;

/// Errors that can occur when validating a post before it is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PostError {
    #[error("Post slug cannot be empty")]
    EmptySlug,
    #[error("Post title cannot be empty")]
    EmptyTitle,
    #[error("Post created_at cannot be empty")]
    EmptyCreatedAt,
    #[error("Invalid created_at timestamp: {0}")]
    InvalidCreatedAt(String),
    #[error("Tag cannot be empty")]
    EmptyTag,
}
