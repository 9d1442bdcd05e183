//! DynamoDB key generation functions.
//!
//! Pure functions for generating partition and sort keys following the single-table design.
//! All functions are sync and have no side effects.
//!
//! | Record       | PK           | SK             | SK_LSI1                               |
//! |--------------|--------------|----------------|---------------------------------------|
//! | Post         | `POST`       | `POST#<slug>`  | `CREATED_AT#<created_at>#POST#<slug>` |
//! | Tag metadata | `TAG`        | `TAG#<tag>`    | (none)                                |
//! | Tag mapping  | `TAG#<tag>`  | `POST#<slug>`  | `CREATED_AT#<created_at>#POST#<slug>` |

// ============================================================================
// Attribute names
// ============================================================================

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const SK_LSI1: &str = "SK_LSI1";

/// Local secondary index ordering a partition by creation time.
pub const LSI1: &str = "LSI1";

// ============================================================================
// Key prefixes
// ============================================================================

pub const POST_BUCKET: &str = "POST";
pub const TAG_BUCKET: &str = "TAG";
pub const POST_PREFIX: &str = "POST#";
pub const TAG_PREFIX: &str = "TAG#";
pub const CREATED_AT_PREFIX: &str = "CREATED_AT#";

// ============================================================================
// Post keys
// ============================================================================

/// Partition key shared by every Post record.
///
/// Pattern: `POST`
pub fn post_pk() -> &'static str {
    POST_BUCKET
}

/// Sort key for a Post record and for each of its tag mappings.
///
/// Pattern: `POST#<slug>`
pub fn post_sk(slug: &str) -> String {
    format!("{POST_PREFIX}{slug}")
}

/// Chronological sort key used by LSI1.
///
/// Pattern: `CREATED_AT#<created_at>#POST#<slug>`
///
/// `created_at` is ISO 8601, so lexicographic order is chronological order.
/// The slug suffix keeps two posts with the same timestamp distinct.
pub fn post_lsi1_sk(created_at: &str, slug: &str) -> String {
    format!("{CREATED_AT_PREFIX}{created_at}#{POST_PREFIX}{slug}")
}

// ============================================================================
// Tag keys
// ============================================================================

/// Partition key shared by every Tag metadata record.
///
/// Pattern: `TAG`
pub fn tag_metadata_pk() -> &'static str {
    TAG_BUCKET
}

/// Sort key for a Tag metadata record.
///
/// Pattern: `TAG#<tag>`
pub fn tag_metadata_sk(tag: &str) -> String {
    format!("{TAG_PREFIX}{tag}")
}

/// Sort key prefix for scanning all Tag metadata records.
///
/// Pattern: `TAG#`
pub fn tag_metadata_sk_prefix() -> &'static str {
    TAG_PREFIX
}

/// Partition key holding the mappings of one tag.
///
/// Pattern: `TAG#<tag>`
pub fn tag_post_pk(tag: &str) -> String {
    format!("{TAG_PREFIX}{tag}")
}

/// Partition scanned by a post listing: a tag bucket when a tag is given,
/// the global Post bucket otherwise.
pub fn listing_pk(tag: Option<&str>) -> String {
    match tag {
        Some(tag) if !tag.is_empty() => tag_post_pk(tag),
        _ => post_pk().to_string(),
    }
}
