use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate};

use super::error::PostError;
use super::types::{Post, TagWithCount};

/// Validates the fields a post must carry before it can be written.
///
/// `created_at` must be an RFC 3339 timestamp or a plain `YYYY-MM-DD` date;
/// it is embedded in the chronological sort key, so free-form values would
/// break newest-first ordering.
pub fn validate_post(post: &Post) -> Result<(), PostError> {
    if post.slug.trim().is_empty() {
        return Err(PostError::EmptySlug);
    }
    if post.title.trim().is_empty() {
        return Err(PostError::EmptyTitle);
    }
    if post.created_at.trim().is_empty() {
        return Err(PostError::EmptyCreatedAt);
    }
    if !is_valid_timestamp(&post.created_at) {
        return Err(PostError::InvalidCreatedAt(post.created_at.clone()));
    }
    if post.tags.iter().any(|tag| tag.trim().is_empty()) {
        return Err(PostError::EmptyTag);
    }
    Ok(())
}

fn is_valid_timestamp(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// Removes repeated tags, keeping the first occurrence of each.
pub fn unique_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(tags.len());
    tags.iter()
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Returns a copy of the post whose tag list has no repeats.
pub fn normalize_post(post: &Post) -> Post {
    Post {
        tags: unique_tags(&post.tags),
        ..post.clone()
    }
}

/// Collects every distinct tag referenced by a set of posts, in name order.
pub fn collect_tags(posts: &[Post]) -> Vec<String> {
    posts
        .iter()
        .flat_map(|post| post.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Orders tags by post count, highest first. Ties are broken by tag name.
pub fn rank_tags(mut tags: Vec<TagWithCount>) -> Vec<TagWithCount> {
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    tags
}
