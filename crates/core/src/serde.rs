//! Serde helper functions for post payloads.
//!
//! Publishing pipelines send `null` for fields that a post does not set
//! (a missing description, an untagged draft). These helpers fold `null`
//! into the empty value so the domain types never carry an `Option` for them.

use serde::{Deserialize, Deserializer};

/// Deserialize a string, treating `null` as the empty string.
pub fn deserialize_null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.unwrap_or_default())
}

/// Deserialize a list of strings, treating `null` as the empty list.
pub fn deserialize_null_as_empty_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(v.unwrap_or_default())
}
