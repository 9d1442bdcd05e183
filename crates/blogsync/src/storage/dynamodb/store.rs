//! The table capability the repository is built on.
//!
//! `TableStore` is the narrow set of single-table operations the repository
//! needs. It is injected at construction time; the repository never reaches
//! for a process-wide client.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use thiserror::Error;

#[cfg(any(test, feature = "inmemory"))]
use super::keys;

/// Raw attribute map of one stored item (or of a key).
pub type Item = HashMap<String, AttributeValue>;

/// DynamoDB rejects transactions with more items than this.
pub const MAX_TRANSACTION_ITEMS: usize = 100;

/// DynamoDB rejects batch writes with more requests than this.
#[cfg_attr(not(feature = "dynamodb"), allow(dead_code))]
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// Errors surfaced by a [`TableStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A condition expression evaluated to false. Logically terminal.
    #[error("Conditional check failed")]
    ConditionFailed,
    /// The transaction was canceled and nothing was written.
    #[error("Transaction canceled: {0}")]
    TransactionCanceled(String),
    /// Throttling, network or server-side failure that may succeed on retry.
    #[error("Transient store error: {0}")]
    Transient(String),
    #[error("Store request failed: {0}")]
    Request(String),
}

impl StoreError {
    /// Only transient failures are retried. Condition failures never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// One element of an atomic multi-item write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Unconditional create-or-replace of a full item.
    Put(Item),
    /// Unconditional delete by primary key.
    Delete(Item),
}

#[cfg(any(test, feature = "inmemory"))]
impl WriteOp {
    /// The `(PK, SK)` pair this operation targets, if the map carries one.
    pub fn target(&self) -> Option<(&str, &str)> {
        let item = match self {
            WriteOp::Put(item) | WriteOp::Delete(item) => item,
        };
        primary_key(item)
    }
}

/// Extracts the string `(PK, SK)` pair of an item or key map.
#[cfg(any(test, feature = "inmemory"))]
pub fn primary_key(item: &Item) -> Option<(&str, &str)> {
    let pk = item.get(keys::PK)?.as_s().ok()?;
    let sk = item.get(keys::SK)?.as_s().ok()?;
    Some((pk.as_str(), sk.as_str()))
}

/// A query against one partition of the base table or of an index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub partition: String,
    /// `None` queries the base table (ordered by `SK`).
    pub index: Option<&'static str>,
    /// Restricts results to sort keys starting with this prefix.
    pub sort_key_prefix: Option<String>,
    pub descending: bool,
    pub limit: Option<u32>,
    pub exclusive_start_key: Option<Item>,
    /// Attributes to return. `None` returns whole items.
    pub projection: Option<Vec<&'static str>>,
}

impl TableQuery {
    pub fn partition(pk: impl Into<String>) -> Self {
        Self {
            partition: pk.into(),
            ..Self::default()
        }
    }

    pub fn on_index(mut self, index: &'static str) -> Self {
        self.index = Some(index);
        self
    }

    pub fn begins_with(mut self, prefix: impl Into<String>) -> Self {
        self.sort_key_prefix = Some(prefix.into());
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, key: Option<Item>) -> Self {
        self.exclusive_start_key = key;
        self
    }

    pub fn project(mut self, attributes: &[&'static str]) -> Self {
        self.projection = Some(attributes.to_vec());
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Present when the query stopped before the end of the partition.
    pub last_evaluated_key: Option<Item>,
}

/// Single-table operations used by the post repository.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Writes an item only if no item with the same key exists.
    ///
    /// Returns [`StoreError::ConditionFailed`] when the key is taken.
    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError>;

    /// Applies all operations atomically, or none of them.
    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Reads one item by primary key.
    async fn get(&self, key: Item) -> Result<Option<Item>, StoreError>;

    /// Reads one page of a partition.
    async fn query(&self, query: TableQuery) -> Result<QueryPage, StoreError>;

    /// Counts the items of a base-table partition without returning them.
    async fn count(&self, partition: &str) -> Result<usize, StoreError>;

    /// Best-effort bulk overwrite. Not atomic.
    async fn batch_put(&self, items: Vec<Item>) -> Result<(), StoreError>;
}
