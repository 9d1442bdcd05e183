use serde::{Deserialize, Serialize};

/// The key tuple the store hands back when a chronological scan is truncated.
///
/// A resume key is only meaningful for the partition (and index) it came
/// from; `pk` is therefore checked against the requested partition before
/// the key is reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeKey {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "SK_LSI1")]
    pub sk_lsi1: String,
}

impl ResumeKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>, sk_lsi1: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
            sk_lsi1: sk_lsi1.into(),
        }
    }
}
