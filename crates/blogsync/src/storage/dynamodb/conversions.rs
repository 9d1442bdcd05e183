//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and domain types.
//! This is the only place that knows the attribute layout of a record; the
//! repository works with `Post`, `ResumeKey` and the maps these functions return.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use blogsync_core::post::Post;
use blogsync_core::storage::{RepositoryError, ResumeKey};

use super::keys;
use super::store::Item;

// ============================================================================
// Entity type constants
// ============================================================================

pub const TYPE_ATTRIBUTE: &str = "Type";

pub const ENTITY_TYPE_POST: &str = "POST";
pub const ENTITY_TYPE_TAG: &str = "TAG";
pub const ENTITY_TYPE_TAG_POST: &str = "TAG_POST";

/// Attribute holding the slug of a post, or the name of a tag in tag metadata.
pub const SLUG_ATTRIBUTE: &str = "slug";

/// Which copy of a post an item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind<'a> {
    /// The canonical Post record in the `POST` bucket.
    Post,
    /// The denormalized copy stored under a tag's bucket.
    TagPost(&'a str),
}

// ============================================================================
// Post conversions
// ============================================================================

/// Convert a Post to the DynamoDB item of the given record kind.
pub fn post_to_item(post: &Post, kind: RecordKind<'_>) -> Item {
    let mut item = HashMap::new();

    // Keys
    let (pk, entity_type) = match kind {
        RecordKind::Post => (keys::post_pk().to_string(), ENTITY_TYPE_POST),
        RecordKind::TagPost(tag) => (keys::tag_post_pk(tag), ENTITY_TYPE_TAG_POST),
    };
    item.insert(keys::PK.to_string(), AttributeValue::S(pk));
    item.insert(
        keys::SK.to_string(),
        AttributeValue::S(keys::post_sk(&post.slug)),
    );
    item.insert(
        keys::SK_LSI1.to_string(),
        AttributeValue::S(keys::post_lsi1_sk(&post.created_at, &post.slug)),
    );

    // Entity type
    item.insert(
        TYPE_ATTRIBUTE.to_string(),
        AttributeValue::S(entity_type.to_string()),
    );

    // Data
    item.insert("title".to_string(), AttributeValue::S(post.title.clone()));
    item.insert(
        "tags".to_string(),
        AttributeValue::L(
            post.tags
                .iter()
                .map(|tag| AttributeValue::S(tag.clone()))
                .collect(),
        ),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(post.created_at.clone()),
    );
    item.insert(
        "description".to_string(),
        AttributeValue::S(post.description.clone()),
    );
    item.insert(
        SLUG_ATTRIBUTE.to_string(),
        AttributeValue::S(post.slug.clone()),
    );

    item
}

/// Build the Post record followed by one mapping record per tag.
///
/// The caller is expected to have removed repeated tags.
pub fn post_to_items(post: &Post) -> Vec<Item> {
    std::iter::once(post_to_item(post, RecordKind::Post))
        .chain(
            post.tags
                .iter()
                .map(|tag| post_to_item(post, RecordKind::TagPost(tag))),
        )
        .collect()
}

/// Convert a Post or Tag-post mapping item to a Post.
pub fn item_to_post(item: &Item) -> Result<Post, RepositoryError> {
    let entity_type = get_string(item, TYPE_ATTRIBUTE)?;
    if entity_type != ENTITY_TYPE_POST && entity_type != ENTITY_TYPE_TAG_POST {
        return Err(RepositoryError::Decode(format!(
            "Expected a post record, found {}",
            entity_type
        )));
    }

    Ok(Post {
        title: get_string(item, "title")?,
        tags: get_optional_string_list(item, "tags")?,
        created_at: get_string(item, "created_at")?,
        description: get_optional_string(item, "description")?,
        slug: get_string(item, SLUG_ATTRIBUTE)?,
    })
}

/// Key of the Post record for a slug.
pub fn post_key(slug: &str) -> Item {
    key(keys::post_pk().to_string(), keys::post_sk(slug))
}

/// Key of the mapping record of a post under one tag.
pub fn tag_post_key(tag: &str, slug: &str) -> Item {
    key(keys::tag_post_pk(tag), keys::post_sk(slug))
}

// ============================================================================
// Tag metadata conversions
// ============================================================================

/// Convert a tag name to its Tag metadata item.
pub fn tag_metadata_item(tag: &str) -> Item {
    let mut item = key(keys::tag_metadata_pk().to_string(), keys::tag_metadata_sk(tag));
    item.insert(
        TYPE_ATTRIBUTE.to_string(),
        AttributeValue::S(ENTITY_TYPE_TAG.to_string()),
    );
    item.insert(SLUG_ATTRIBUTE.to_string(), AttributeValue::S(tag.to_string()));
    item
}

/// Read the tag name from a (possibly projected) Tag metadata item.
pub fn item_to_tag_name(item: &Item) -> Result<String, RepositoryError> {
    get_string(item, SLUG_ATTRIBUTE)
}

// ============================================================================
// Resume key conversions
// ============================================================================

/// Convert a resume key into the exclusive start key of a LSI1 query.
pub fn resume_key_to_item(resume_key: &ResumeKey) -> Item {
    let mut item = key(resume_key.pk.clone(), resume_key.sk.clone());
    item.insert(
        keys::SK_LSI1.to_string(),
        AttributeValue::S(resume_key.sk_lsi1.clone()),
    );
    item
}

/// Convert the last evaluated key of a LSI1 query into a resume key.
pub fn item_to_resume_key(item: &Item) -> Result<ResumeKey, RepositoryError> {
    Ok(ResumeKey {
        pk: get_string(item, keys::PK)?,
        sk: get_string(item, keys::SK)?,
        sk_lsi1: get_string(item, keys::SK_LSI1)?,
    })
}

// ============================================================================
// Helper functions
// ============================================================================

fn key(pk: String, sk: String) -> Item {
    HashMap::from([
        (keys::PK.to_string(), AttributeValue::S(pk)),
        (keys::SK.to_string(), AttributeValue::S(sk)),
    ])
}

/// Get a required string attribute.
fn get_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::Decode(format!("Missing or invalid field: {}", key)))
}

/// Get an optional string attribute. Present with another type is an error.
fn get_optional_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(String::new()),
        Some(_) => get_string(item, key),
    }
}

/// Get an optional list of strings. Every element must be a string.
fn get_optional_string_list(item: &Item, key: &str) -> Result<Vec<String>, RepositoryError> {
    let values = match item.get(key) {
        None | Some(AttributeValue::Null(_)) => return Ok(Vec::new()),
        Some(value) => value
            .as_l()
            .map_err(|_| RepositoryError::Decode(format!("Invalid list field: {}", key)))?,
    };

    values
        .iter()
        .map(|value| {
            value
                .as_s()
                .map(|s| s.to_string())
                .map_err(|_| RepositoryError::Decode(format!("Invalid element in {}", key)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> Post {
        Post::new("a", "A", "2024-01-01T00:00:00Z")
            .with_tags(["go", "backend"])
            .with_description("First post")
    }

    #[test]
    fn test_post_round_trip() {
        let post = sample_post();
        let item = post_to_item(&post, RecordKind::Post);
        assert_eq!(item_to_post(&item).unwrap(), post);
    }

    #[test]
    fn test_tag_post_round_trip() {
        let post = sample_post();
        let item = post_to_item(&post, RecordKind::TagPost("go"));
        assert_eq!(item_to_post(&item).unwrap(), post);
    }

    #[test]
    fn test_post_item_has_correct_keys() {
        let item = post_to_item(&sample_post(), RecordKind::Post);

        assert_eq!(item.get("PK").unwrap().as_s().unwrap(), "POST");
        assert_eq!(item.get("SK").unwrap().as_s().unwrap(), "POST#a");
        assert_eq!(
            item.get("SK_LSI1").unwrap().as_s().unwrap(),
            "CREATED_AT#2024-01-01T00:00:00Z#POST#a"
        );
        assert_eq!(item.get("Type").unwrap().as_s().unwrap(), "POST");
    }

    #[test]
    fn test_tag_post_item_has_correct_keys() {
        let item = post_to_item(&sample_post(), RecordKind::TagPost("backend"));

        assert_eq!(item.get("PK").unwrap().as_s().unwrap(), "TAG#backend");
        assert_eq!(item.get("SK").unwrap().as_s().unwrap(), "POST#a");
        assert_eq!(item.get("Type").unwrap().as_s().unwrap(), "TAG_POST");
    }

    #[test]
    fn test_post_to_items_fans_out_per_tag() {
        let items = post_to_items(&sample_post());
        let pks: Vec<&str> = items
            .iter()
            .map(|item| item.get("PK").unwrap().as_s().unwrap().as_str())
            .collect();
        assert_eq!(pks, vec!["POST", "TAG#go", "TAG#backend"]);
    }

    #[test]
    fn test_tag_metadata_item() {
        let item = tag_metadata_item("rust");

        assert_eq!(item.get("PK").unwrap().as_s().unwrap(), "TAG");
        assert_eq!(item.get("SK").unwrap().as_s().unwrap(), "TAG#rust");
        assert_eq!(item.get("Type").unwrap().as_s().unwrap(), "TAG");
        assert!(item.get("SK_LSI1").is_none());
        assert_eq!(item_to_tag_name(&item).unwrap(), "rust");
    }

    #[test]
    fn test_item_to_post_missing_title() {
        let mut item = post_to_item(&sample_post(), RecordKind::Post);
        item.remove("title");
        assert!(matches!(
            item_to_post(&item),
            Err(RepositoryError::Decode(_))
        ));
    }

    #[test]
    fn test_item_to_post_wrong_type() {
        let mut item = post_to_item(&sample_post(), RecordKind::Post);
        item.insert("created_at".to_string(), AttributeValue::N("1".to_string()));
        assert!(matches!(
            item_to_post(&item),
            Err(RepositoryError::Decode(_))
        ));
    }

    #[test]
    fn test_item_to_post_rejects_tag_metadata() {
        let item = tag_metadata_item("rust");
        assert!(matches!(
            item_to_post(&item),
            Err(RepositoryError::Decode(_))
        ));
    }

    #[test]
    fn test_item_to_post_tolerates_missing_optional_fields() {
        let mut item = post_to_item(&sample_post(), RecordKind::Post);
        item.remove("tags");
        item.remove("description");

        let post = item_to_post(&item).unwrap();
        assert!(post.tags.is_empty());
        assert_eq!(post.description, "");
    }

    #[test]
    fn test_item_to_post_rejects_non_string_tag() {
        let mut item = post_to_item(&sample_post(), RecordKind::Post);
        item.insert(
            "tags".to_string(),
            AttributeValue::L(vec![AttributeValue::N("1".to_string())]),
        );
        assert!(matches!(
            item_to_post(&item),
            Err(RepositoryError::Decode(_))
        ));
    }

    #[test]
    fn test_resume_key_round_trip() {
        let resume_key = ResumeKey::new("TAG#go", "POST#a", "CREATED_AT#2024#POST#a");
        let item = resume_key_to_item(&resume_key);
        assert_eq!(item_to_resume_key(&item).unwrap(), resume_key);
    }

    #[test]
    fn test_item_to_resume_key_missing_lsi_attribute() {
        let item = post_key("a");
        assert!(matches!(
            item_to_resume_key(&item),
            Err(RepositoryError::Decode(_))
        ));
    }
}
