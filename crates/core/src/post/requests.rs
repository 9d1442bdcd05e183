//! API request types for post operations.
//!
//! Pure data types for the write endpoints. Decoding of the push-event
//! envelope happens here so handlers only deal with domain values.

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Post;

/// Request payload for the administrative resync endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardSyncRequest {
    pub posts: Vec<Post>,
}

/// Kind of change announced by the publishing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostEventKind {
    Created,
    MetaUpdated,
    ContentUpdated,
    Deleted,
    Unknown(String),
}

impl PostEventKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "POST_CREATED" => Self::Created,
            "META_UPDATED" => Self::MetaUpdated,
            "CONTENT_UPDATED" => Self::ContentUpdated,
            "POST_DELETED" => Self::Deleted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Attributes attached to a push message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEventAttributes {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub slug: String,
}

/// A single push message. `data` is base64-encoded JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEventMessage {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub attributes: PostEventAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Push subscription envelope delivered to `/blog/events/posts-updated`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostsUpdatedEvent {
    pub message: PostEventMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

/// Errors raised while unpacking a push message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Event data is not valid base64: {0}")]
    InvalidEncoding(String),
    #[error("Event data is not a valid post: {0}")]
    InvalidPost(String),
    #[error("Missing slug attribute")]
    MissingSlug,
}

impl PostsUpdatedEvent {
    pub fn kind(&self) -> PostEventKind {
        PostEventKind::parse(&self.message.attributes.event_type)
    }

    /// Decodes the post carried in the message body.
    pub fn post(&self) -> Result<Post, EventError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.message.data.as_bytes())
            .map_err(|e| EventError::InvalidEncoding(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| EventError::InvalidPost(e.to_string()))
    }

    /// Slug named by the message attributes.
    pub fn slug(&self) -> Result<&str, EventError> {
        let slug = self.message.attributes.slug.trim();
        if slug.is_empty() {
            return Err(EventError::MissingSlug);
        }
        Ok(slug)
    }
}
