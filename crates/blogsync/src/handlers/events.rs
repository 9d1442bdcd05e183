//! Push events from the publishing pipeline.
//!
//! The pipeline announces every change to a post as a push message. Events
//! that change stored data are applied to the repository; every recognized
//! event then invalidates the cached blog pages.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use blogsync_core::post::{validate_post, EventError, PostEventKind, PostsUpdatedEvent};
use blogsync_core::storage::RepositoryError;

use crate::{
    cdn::invalidate_blog,
    handlers::{posts::MessageResponse, AppError},
    state::AppState,
};

/// Malformed events are the publisher's fault, so they are 400s.
fn invalid_event(err: EventError) -> AppError {
    AppError::validation(err.to_string())
}

/// Apply a post change event (POST /blog/events/posts-updated).
pub async fn posts_updated(
    State(state): State<AppState>,
    payload: Result<Json<PostsUpdatedEvent>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(event) =
        payload.map_err(|e| AppError::validation(format!("Invalid request payload: {}", e)))?;
    let kind = event.kind();

    tracing::info!(
        event_type = %event.message.attributes.event_type,
        message_id = event.message.message_id.as_deref().unwrap_or_default(),
        "Post event received"
    );

    let response = match kind {
        PostEventKind::Created | PostEventKind::MetaUpdated => {
            let post = event.post().map_err(invalid_event)?;
            validate_post(&post).map_err(RepositoryError::from)?;
            state.repo.upsert_post(&post).await?;
            MessageResponse::new("Post upserted successfully")
        }
        PostEventKind::Deleted => {
            let slug = event.slug().map_err(invalid_event)?;
            state.repo.delete_post(slug).await?;
            MessageResponse::new("Post deleted successfully")
        }
        // Content lives outside the table; only the cache needs refreshing.
        PostEventKind::ContentUpdated => MessageResponse::new("ok"),
        PostEventKind::Unknown(event_type) => {
            return Err(AppError::validation(format!(
                "Invalid event type: {}",
                event_type
            )));
        }
    };

    invalidate_blog(state.cdn.as_ref()).await;
    Ok(response)
}
