mod error;
mod operations;
mod requests;
mod types;

pub use error::PostError;
pub use operations::{collect_tags, normalize_post, rank_tags, unique_tags, validate_post};
pub use requests::{
    EventError, HardSyncRequest, PostEventAttributes, PostEventKind, PostEventMessage,
    PostsUpdatedEvent,
};
pub use types::{ListPosts, Post, TagWithCount};
