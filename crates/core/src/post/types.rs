use serde::{Deserialize, Serialize};

use crate::serde::{deserialize_null_as_empty, deserialize_null_as_empty_vec};

/// A published blog post, keyed by its slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub tags: Vec<String>,
    /// ISO-8601 creation timestamp. Immutable once the post exists.
    pub created_at: String,
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub description: String,
    /// Unique, immutable identifier.
    pub slug: String,
}

impl Post {
    /// Creates a post with no tags and no description.
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            tags: Vec::new(),
            created_at: created_at.into(),
            description: String::new(),
            slug: slug.into(),
        }
    }

    /// Sets the tags for this post.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the description for this post.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A tag together with the number of posts that carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagWithCount {
    pub tag: String,
    pub count: usize,
}

impl TagWithCount {
    pub fn new(tag: impl Into<String>, count: usize) -> Self {
        Self {
            tag: tag.into(),
            count,
        }
    }
}

/// One page of posts, newest first.
///
/// `next_cursor` is absent on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPosts {
    pub items: Vec<Post>,
    #[serde(rename = "nextCursor", alias = "next_cursor", default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_builder() {
        let post = Post::new("hello-world", "Hello", "2024-01-01T00:00:00Z")
            .with_tags(["rust", "aws"])
            .with_description("First post");

        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.tags, vec!["rust".to_string(), "aws".to_string()]);
        assert_eq!(post.description, "First post");
    }

    #[test]
    fn test_post_deserializes_null_description() {
        let json = r#"{
            "title": "Hello",
            "tags": ["go"],
            "created_at": "2024-01-01T00:00:00Z",
            "description": null,
            "slug": "hello"
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.description, "");
        assert_eq!(post.tags, vec!["go".to_string()]);
    }

    #[test]
    fn test_list_posts_serializes_next_cursor_in_camel_case() {
        let page = ListPosts {
            items: vec![],
            next_cursor: Some("abc".to_string()),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["nextCursor"], "abc");

        let last = ListPosts::default();
        let json = serde_json::to_value(&last).unwrap();
        assert!(json["nextCursor"].is_null());
    }
}
