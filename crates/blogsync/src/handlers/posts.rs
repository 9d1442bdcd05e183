//! Post handlers.
//!
//! Direct reads and writes of single posts. Cache invalidation belongs to the
//! event and sync endpoints the publishing pipeline calls.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use blogsync_core::post::{validate_post, ListPosts, Post};
use blogsync_core::storage::RepositoryError;

use crate::{handlers::AppError, state::AppState};

/// Query parameters for listing posts.
#[derive(Debug, Default, Deserialize)]
pub struct ListPostsQuery {
    /// Page size; parsed by hand so a bad value gets the JSON error body.
    pub limit: Option<String>,
    /// Only posts carrying this tag.
    pub tag: Option<String>,
    /// Token returned as `nextCursor` by the previous page.
    pub cursor: Option<String>,
}

/// Body of a successful write.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Parses `limit`, falling back to the default page size when absent.
fn parse_limit(raw: Option<&str>, default: u32, max: u32) -> Result<u32, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(default);
    };

    match raw.parse::<u32>() {
        Ok(limit) if (1..=max).contains(&limit) => Ok(limit),
        _ => Err(AppError::validation(format!(
            "Invalid limit: must be a number between 1 and {}",
            max
        ))),
    }
}

// ============================================================================
// Read
// ============================================================================

/// List posts, newest first (GET /blog/posts).
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ListPosts>, AppError> {
    let limit = parse_limit(
        query.limit.as_deref(),
        state.config.default_page_size,
        state.config.max_page_size,
    )?;
    let tag = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let page = state
        .repo
        .get_posts(limit, tag, query.cursor.as_deref())
        .await?;

    tracing::debug!(
        limit,
        tag = tag.unwrap_or_default(),
        items = page.items.len(),
        more = page.next_cursor.is_some(),
        "Posts retrieved"
    );
    Ok(Json(page))
}

/// Get a single post (GET /blog/posts/{slug}).
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, AppError> {
    let post = state
        .repo
        .get_post(&slug)
        .await?
        .ok_or(RepositoryError::NotFound {
            entity_type: "Post",
            id: slug,
        })?;

    Ok(Json(post))
}

// ============================================================================
// Write
// ============================================================================

/// Create or replace a post (PUT /blog/posts).
pub async fn upsert_post(
    State(state): State<AppState>,
    payload: Result<Json<Post>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(post) =
        payload.map_err(|e| AppError::validation(format!("Invalid request payload: {}", e)))?;
    validate_post(&post).map_err(RepositoryError::from)?;

    state.repo.upsert_post(&post).await?;

    tracing::info!(slug = %post.slug, "Post upserted");
    Ok(MessageResponse::new("Post upserted successfully"))
}

/// Delete a post and its tag mappings (DELETE /blog/posts/{slug}).
pub async fn delete_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if slug.trim().is_empty() {
        return Err(AppError::validation("Missing slug parameter"));
    }

    state.repo.delete_post(&slug).await?;

    tracing::info!(%slug, "Post deleted");
    Ok(MessageResponse::new("Post deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit_defaults() {
        assert_eq!(parse_limit(None, 6, 100).unwrap(), 6);
        assert_eq!(parse_limit(Some(""), 6, 100).unwrap(), 6);
    }

    #[test]
    fn test_parse_limit_bounds() {
        assert_eq!(parse_limit(Some("1"), 6, 100).unwrap(), 1);
        assert_eq!(parse_limit(Some(" 100 "), 6, 100).unwrap(), 100);
        assert!(parse_limit(Some("0"), 6, 100).is_err());
        assert!(parse_limit(Some("101"), 6, 100).is_err());
        assert!(parse_limit(Some("-1"), 6, 100).is_err());
        assert!(parse_limit(Some("six"), 6, 100).is_err());
    }
}
