use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use blogsync_core::post::{validate_post, HardSyncRequest};
use blogsync_core::storage::RepositoryError;

use crate::{
    cdn::invalidate_blog,
    handlers::{posts::MessageResponse, AppError},
    state::AppState,
};

/// Rewrite every post in the request (POST /blog/hardsync).
///
/// All posts are validated before anything is written. Writes are one
/// transaction per post, so a failure part way leaves earlier posts stored.
pub async fn hard_sync(
    State(state): State<AppState>,
    payload: Result<Json<HardSyncRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) =
        payload.map_err(|e| AppError::validation(format!("Invalid request payload: {}", e)))?;

    for post in &request.posts {
        validate_post(post).map_err(|e| {
            RepositoryError::Validation(format!("Post '{}': {}", post.slug, e))
        })?;
    }

    state.repo.upsert_posts_batch(&request.posts).await?;
    tracing::info!(posts = request.posts.len(), "Hard sync completed");

    invalidate_blog(state.cdn.as_ref()).await;
    Ok(MessageResponse::new("ok"))
}
