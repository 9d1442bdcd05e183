use async_trait::async_trait;

use crate::post::{ListPosts, Post, TagWithCount};

use super::Result;

/// Repository for blog posts and their tags.
///
/// Callers validate posts (see [`crate::post::validate_post`]) and bound
/// `limit` before invoking these methods.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Creates or replaces a post and its per-tag mappings atomically.
    ///
    /// Tag metadata is written first and best-effort; failures there are
    /// logged and do not fail the upsert.
    async fn upsert_post(&self, post: &Post) -> Result<()>;

    /// Upserts many posts, one transaction per post.
    ///
    /// Stops at the first failing post. Posts earlier in the slice stay
    /// committed.
    async fn upsert_posts_batch(&self, posts: &[Post]) -> Result<()>;

    /// Gets one page of posts, newest first, optionally restricted to a tag.
    async fn get_posts(
        &self,
        limit: u32,
        tag: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<ListPosts>;

    /// Gets a single post by its slug.
    async fn get_post(&self, slug: &str) -> Result<Option<Post>>;

    /// Gets every known tag with its post count, highest count first.
    async fn get_tags(&self) -> Result<Vec<TagWithCount>>;

    /// Deletes a post and all of its tag mappings atomically.
    async fn delete_post(&self, slug: &str) -> Result<()>;
}
