//! Single-table repository implementation.
//!
//! Implements [`PostRepository`] on top of any [`TableStore`]. Every write of a
//! post goes through one transaction holding the Post record and one mapping
//! record per tag, so a post and its mappings change together or not at all.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};

use blogsync_core::post::{collect_tags, normalize_post, rank_tags, unique_tags};
use blogsync_core::post::{ListPosts, Post, TagWithCount};
use blogsync_core::storage::{
    decode_cursor, encode_cursor, PostRepository, RepositoryError, Result,
};

use super::conversions::{
    item_to_post, item_to_resume_key, item_to_tag_name, post_key, post_to_items,
    resume_key_to_item, tag_metadata_item, tag_post_key, SLUG_ATTRIBUTE,
};
use super::keys;
use super::store::{StoreError, TableQuery, TableStore, WriteOp, MAX_TRANSACTION_ITEMS};

/// Number of tag count queries in flight at once when no limit is configured.
pub const DEFAULT_TAG_COUNT_CONCURRENCY: usize = 16;

const POST_ENTITY: &str = "Post";

/// Post repository backed by a single table.
///
/// The store is injected; wrap it in a
/// [`RetryingStore`](super::RetryingStore) to retry transient failures.
pub struct DynamoDbRepository<S> {
    store: S,
    tag_count_concurrency: usize,
}

impl<S: TableStore> DynamoDbRepository<S> {
    /// Creates a new repository on top of the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            tag_count_concurrency: DEFAULT_TAG_COUNT_CONCURRENCY,
        }
    }

    /// Sets how many tag count queries `get_tags` runs concurrently.
    pub fn with_tag_count_concurrency(mut self, concurrency: usize) -> Self {
        self.tag_count_concurrency = concurrency.max(1);
        self
    }

    /// Inserts the metadata record of each tag unless it already exists.
    ///
    /// Never fails: an existing record is the expected case and any other
    /// error only costs the tag its metadata row.
    async fn ensure_tag_metadata(&self, tags: &[String]) {
        for tag in tags {
            match self.store.put_if_absent(tag_metadata_item(tag)).await {
                Ok(()) => tracing::debug!(%tag, "Created tag metadata"),
                Err(StoreError::ConditionFailed) => {}
                Err(err) => {
                    tracing::warn!(%tag, error = %err, "Failed to create tag metadata, skipping")
                }
            }
        }
    }

    /// Tags the stored version of `post` has and the new version dropped.
    async fn dropped_tags(&self, post: &Post) -> Result<Vec<String>> {
        let Some(item) = self
            .store
            .get(post_key(&post.slug))
            .await
            .map_err(store_error)?
        else {
            return Ok(Vec::new());
        };

        match item_to_post(&item) {
            Ok(previous) => Ok(unique_tags(&previous.tags)
                .into_iter()
                .filter(|tag| !post.tags.contains(tag))
                .collect()),
            Err(err) => {
                tracing::warn!(
                    slug = %post.slug,
                    error = %err,
                    "Stored post is undecodable, its old tag mappings are kept"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Writes one post: tag metadata first, then the post transaction.
    ///
    /// `post` must already be normalized.
    async fn write_post(&self, post: &Post) -> Result<()> {
        check_transaction_size(&post.slug, 1 + post.tags.len())?;
        self.ensure_tag_metadata(&post.tags).await;
        self.commit_post(post).await
    }

    /// Writes the Post record and its mappings in one transaction.
    ///
    /// Deletes of mappings for tags the stored version had and `post` dropped
    /// ride along while they fit under the transaction cap. The rest are
    /// removed by follow-up transactions once the post itself is committed.
    async fn commit_post(&self, post: &Post) -> Result<()> {
        let mut ops: Vec<WriteOp> = post_to_items(post).into_iter().map(WriteOp::Put).collect();
        check_transaction_size(&post.slug, ops.len())?;

        let dropped = self.dropped_tags(post).await?;
        let mut deletes: Vec<WriteOp> = dropped
            .iter()
            .map(|tag| WriteOp::Delete(tag_post_key(tag, &post.slug)))
            .collect();
        let room = MAX_TRANSACTION_ITEMS - ops.len();
        let overflow = deletes.split_off(room.min(deletes.len()));
        ops.extend(deletes);

        self.store
            .transact_write(ops)
            .await
            .map_err(|err| transaction_error(&post.slug, err))?;

        if !overflow.is_empty() {
            self.remove_stale_mappings(&post.slug, overflow).await?;
        }

        tracing::debug!(
            slug = %post.slug,
            tags = post.tags.len(),
            dropped = dropped.len(),
            "Upserted post"
        );
        Ok(())
    }

    /// Deletes mappings left behind by a committed upsert, in chunks that fit
    /// one transaction each.
    async fn remove_stale_mappings(&self, slug: &str, mut deletes: Vec<WriteOp>) -> Result<()> {
        while !deletes.is_empty() {
            let rest = deletes.split_off(MAX_TRANSACTION_ITEMS.min(deletes.len()));
            let count = deletes.len();

            if let Err(err) = self.store.transact_write(deletes).await {
                // The stored post no longer lists these tags, so a later
                // upsert cannot find them again.
                tracing::error!(
                    %slug,
                    stale = count + rest.len(),
                    error = %err,
                    "Post committed but stale tag mappings remain"
                );
                return Err(transaction_error(slug, err));
            }
            deletes = rest;
        }
        Ok(())
    }

    /// Reads every tag name from the Tag metadata bucket, following pages.
    ///
    /// Rows without a readable name are skipped.
    async fn tag_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut start_key = None;

        loop {
            let query = TableQuery::partition(keys::tag_metadata_pk())
                .begins_with(keys::tag_metadata_sk_prefix())
                .project(&[SLUG_ATTRIBUTE])
                .start_after(start_key);
            let page = self.store.query(query).await.map_err(store_error)?;

            for item in &page.items {
                match item_to_tag_name(item) {
                    Ok(name) if !name.is_empty() => names.push(name),
                    Ok(_) => tracing::warn!("Skipping tag metadata with an empty name"),
                    Err(err) => tracing::warn!(error = %err, "Skipping undecodable tag metadata"),
                }
            }

            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        Ok(names)
    }

    async fn count_tag(&self, tag: String) -> Result<TagWithCount> {
        let count = self
            .store
            .count(&keys::tag_post_pk(&tag))
            .await
            .map_err(|err| {
                RepositoryError::AggregationFailed(format!(
                    "Counting posts of tag {} failed: {}",
                    tag, err
                ))
            })?;
        Ok(TagWithCount::new(tag, count))
    }
}

// ============================================================================
// PostRepository implementation
// ============================================================================

#[async_trait]
impl<S: TableStore> PostRepository for DynamoDbRepository<S> {
    async fn upsert_post(&self, post: &Post) -> Result<()> {
        self.write_post(&normalize_post(post)).await
    }

    async fn upsert_posts_batch(&self, posts: &[Post]) -> Result<()> {
        let posts: Vec<Post> = posts.iter().map(normalize_post).collect();
        for post in &posts {
            check_transaction_size(&post.slug, 1 + post.tags.len())?;
        }

        let tags = collect_tags(&posts);
        if !tags.is_empty() {
            self.store
                .batch_put(tags.iter().map(|tag| tag_metadata_item(tag)).collect())
                .await
                .map_err(store_error)?;
        }

        // Tag metadata is already in place, so each post is only its transaction.
        for (index, post) in posts.iter().enumerate() {
            if let Err(err) = self.commit_post(post).await {
                tracing::error!(
                    slug = %post.slug,
                    committed = index,
                    total = posts.len(),
                    error = %err,
                    "Batch upsert stopped"
                );
                return Err(err);
            }
        }

        tracing::info!(posts = posts.len(), tags = tags.len(), "Batch upsert complete");
        Ok(())
    }

    async fn get_posts(
        &self,
        limit: u32,
        tag: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<ListPosts> {
        if limit == 0 {
            return Err(RepositoryError::Validation(
                "limit must be at least 1".to_string(),
            ));
        }

        let partition = keys::listing_pk(tag);

        // Only an absent or empty cursor means the first page.
        let start_key = match cursor.filter(|token| !token.is_empty()) {
            Some(token) => {
                let resume_key = decode_cursor(token)?;
                if resume_key.pk != partition {
                    return Err(RepositoryError::InvalidCursor(format!(
                        "cursor belongs to partition {}, not {}",
                        resume_key.pk, partition
                    )));
                }
                Some(resume_key_to_item(&resume_key))
            }
            None => None,
        };

        let query = TableQuery::partition(partition)
            .on_index(keys::LSI1)
            .descending()
            .limit(limit)
            .start_after(start_key);
        let page = self.store.query(query).await.map_err(store_error)?;

        let items = page
            .items
            .iter()
            .map(item_to_post)
            .collect::<Result<Vec<_>>>()?;

        let next_cursor = match &page.last_evaluated_key {
            Some(key) => Some(encode_cursor(&item_to_resume_key(key)?)?),
            None => None,
        };

        Ok(ListPosts { items, next_cursor })
    }

    async fn get_post(&self, slug: &str) -> Result<Option<Post>> {
        let item = self.store.get(post_key(slug)).await.map_err(store_error)?;

        match item {
            Some(item) => Ok(Some(item_to_post(&item)?)),
            None => Ok(None),
        }
    }

    async fn get_tags(&self) -> Result<Vec<TagWithCount>> {
        let names = self.tag_names().await?;
        let total = names.len();

        // The first failed count drops every count still in flight.
        let counts = names.into_iter().map(|tag| self.count_tag(tag));
        let counted: Vec<TagWithCount> = stream::iter(counts)
            .buffer_unordered(self.tag_count_concurrency)
            .try_collect()
            .await?;

        tracing::debug!(tags = total, "Counted posts per tag");
        Ok(rank_tags(counted))
    }

    async fn delete_post(&self, slug: &str) -> Result<()> {
        let item = self
            .store
            .get(post_key(slug))
            .await
            .map_err(store_error)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: POST_ENTITY,
                id: slug.to_string(),
            })?;
        let post = item_to_post(&item)?;

        let ops: Vec<WriteOp> = std::iter::once(WriteOp::Delete(post_key(slug)))
            .chain(
                unique_tags(&post.tags)
                    .iter()
                    .map(|tag| WriteOp::Delete(tag_post_key(tag, slug))),
            )
            .collect();
        check_transaction_size(slug, ops.len())?;

        self.store
            .transact_write(ops)
            .await
            .map_err(|err| transaction_error(slug, err))?;

        tracing::debug!(%slug, tags = post.tags.len(), "Deleted post");
        Ok(())
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn check_transaction_size(slug: &str, items: usize) -> Result<()> {
    if items > MAX_TRANSACTION_ITEMS {
        return Err(RepositoryError::Validation(format!(
            "post {} needs {} records in one transaction, the limit is {}",
            slug, items, MAX_TRANSACTION_ITEMS
        )));
    }
    Ok(())
}

fn transaction_error(slug: &str, err: StoreError) -> RepositoryError {
    RepositoryError::TransactionFailed(format!("post {}: {}", slug, err))
}

fn store_error(err: StoreError) -> RepositoryError {
    match err {
        StoreError::Transient(message) => RepositoryError::ConnectionFailed(message),
        other => RepositoryError::QueryFailed(other.to_string()),
    }
}
