use axum::{extract::State, Json};

use blogsync_core::post::TagWithCount;

use crate::{handlers::AppError, state::AppState};

/// List every tag with its post count (GET /blog/tags).
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagWithCount>>, AppError> {
    let tags = state.repo.get_tags().await?;

    tracing::debug!(count = tags.len(), "Tags retrieved");
    Ok(Json(tags))
}
