//! In-memory emulation of the single table.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::dynamodb::keys;
use crate::storage::dynamodb::store::{
    primary_key, Item, QueryPage, StoreError, TableQuery, TableStore, WriteOp,
    MAX_TRANSACTION_ITEMS,
};

/// Sort position of an item inside a partition: the range key of the queried
/// index, then `SK` to break ties the way the base table does.
type Position = (String, String);

/// Failures to inject into the next calls. Used by tests to exercise the
/// error paths of the repository.
#[derive(Debug, Default)]
struct Faults {
    /// Number of transactions that still succeed before every later one is canceled.
    transactions_before_failure: Option<usize>,
    /// Every `put_if_absent` fails with a non-condition error.
    conditional_puts: bool,
    /// Partitions whose `count` fails.
    count_partitions: HashSet<String>,
    /// The next N calls of any kind fail with a transient error.
    transient: usize,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<(String, String), Item>,
    faults: Faults,
    /// `put_if_absent` calls seen so far, whatever their outcome.
    #[cfg(test)]
    conditional_put_calls: usize,
}

impl State {
    fn take_transient(&mut self) -> Result<(), StoreError> {
        if self.faults.transient > 0 {
            self.faults.transient -= 1;
            return Err(StoreError::Transient("injected throttling".to_string()));
        }
        Ok(())
    }
}

/// Single-table store held in memory.
///
/// Items live in a `BTreeMap` keyed by `(PK, SK)` wrapped in `Arc<RwLock<_>>`.
/// Transactions, conditional puts, the sparse `LSI1` index, exclusive start
/// keys and projections behave like the real table. Data is lost when the
/// last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTable {
    state: Arc<RwLock<State>>,
}

impl InMemoryTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Inspection and failure injection for tests.
#[cfg(test)]
impl InMemoryTable {
    /// Number of stored items across all partitions.
    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Raw item stored under `(pk, sk)`.
    pub async fn raw_item(&self, pk: &str, sk: &str) -> Option<Item> {
        self.state
            .read()
            .await
            .items
            .get(&(pk.to_string(), sk.to_string()))
            .cloned()
    }

    /// Stores an item as-is, bypassing every check. Returns false when the
    /// item carries no string key.
    pub async fn insert_raw(&self, item: Item) -> bool {
        let Some((pk, sk)) = primary_key(&item).map(|(pk, sk)| (pk.to_string(), sk.to_string()))
        else {
            return false;
        };
        self.state.write().await.items.insert((pk, sk), item);
        true
    }

    /// Lets `successes` more transactions through, then cancels all later ones.
    pub async fn fail_transactions_after(&self, successes: usize) {
        self.state.write().await.faults.transactions_before_failure = Some(successes);
    }

    /// Cancels every later transaction.
    pub async fn fail_transactions(&self) {
        self.fail_transactions_after(0).await;
    }

    /// Makes every `put_if_absent` fail with a request error.
    pub async fn fail_conditional_puts(&self) {
        self.state.write().await.faults.conditional_puts = true;
    }

    /// Makes `count` fail for one partition.
    pub async fn fail_count_for(&self, partition: impl Into<String>) {
        self.state
            .write()
            .await
            .faults
            .count_partitions
            .insert(partition.into());
    }

    /// Makes the next `calls` operations fail with a transient error.
    pub async fn fail_transiently(&self, calls: usize) {
        self.state.write().await.faults.transient = calls;
    }

    /// Number of `put_if_absent` calls made so far.
    pub async fn conditional_put_calls(&self) -> usize {
        self.state.read().await.conditional_put_calls
    }

    /// Clears every injected failure.
    pub async fn heal(&self) {
        self.state.write().await.faults = Faults::default();
    }
}

#[async_trait]
impl TableStore for InMemoryTable {
    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        #[cfg(test)]
        {
            state.conditional_put_calls += 1;
        }
        state.take_transient()?;

        if state.faults.conditional_puts {
            return Err(StoreError::Request("injected put failure".to_string()));
        }

        let key = owned_key(&item)?;
        if state.items.contains_key(&key) {
            return Err(StoreError::ConditionFailed);
        }
        state.items.insert(key, item);
        Ok(())
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.take_transient()?;

        if ops.is_empty() {
            return Err(StoreError::Request(
                "Transaction must contain at least one item".to_string(),
            ));
        }
        if ops.len() > MAX_TRANSACTION_ITEMS {
            return Err(StoreError::Request(format!(
                "Transaction has {} items, the limit is {}",
                ops.len(),
                MAX_TRANSACTION_ITEMS
            )));
        }

        let mut targets = HashSet::with_capacity(ops.len());
        for op in &ops {
            let (pk, sk) = op
                .target()
                .ok_or_else(|| StoreError::Request("Missing key attributes".to_string()))?;
            if !targets.insert((pk.to_string(), sk.to_string())) {
                return Err(StoreError::Request(
                    "Transaction contains multiple operations on one item".to_string(),
                ));
            }
        }

        if let Some(remaining) = state.faults.transactions_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(StoreError::TransactionCanceled(
                    "injected transaction failure".to_string(),
                ));
            }
            *remaining -= 1;
        }

        for op in ops {
            match op {
                WriteOp::Put(item) => {
                    let key = owned_key(&item)?;
                    state.items.insert(key, item);
                }
                WriteOp::Delete(key) => {
                    let key = owned_key(&key)?;
                    state.items.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn get(&self, key: Item) -> Result<Option<Item>, StoreError> {
        let mut state = self.state.write().await;
        state.take_transient()?;

        let key = owned_key(&key)?;
        Ok(state.items.get(&key).cloned())
    }

    async fn query(&self, query: TableQuery) -> Result<QueryPage, StoreError> {
        let mut state = self.state.write().await;
        state.take_transient()?;

        if query.limit == Some(0) {
            return Err(StoreError::Request("Limit must be at least 1".to_string()));
        }

        let range_attribute = match query.index {
            None => keys::SK,
            Some(keys::LSI1) => keys::SK_LSI1,
            Some(other) => return Err(StoreError::Request(format!("Unknown index: {}", other))),
        };

        // Items without the index range key are not part of a sparse index.
        let mut matches: Vec<(Position, &Item)> = state
            .items
            .range((query.partition.clone(), String::new())..)
            .take_while(|((pk, _), _)| *pk == query.partition)
            .filter_map(|((_, sk), item)| {
                let range_key = string_attribute(item, range_attribute)?;
                Some(((range_key.to_string(), sk.clone()), item))
            })
            .filter(|((range_key, _), _)| match &query.sort_key_prefix {
                Some(prefix) => range_key.starts_with(prefix.as_str()),
                None => true,
            })
            .collect();

        matches.sort_by(|(a, _), (b, _)| a.cmp(b));
        if query.descending {
            matches.reverse();
        }

        let start = match &query.exclusive_start_key {
            Some(start_key) => {
                let start = start_position(start_key, range_attribute)?;
                let after = |position: &Position| match position.cmp(&start) {
                    Ordering::Greater => !query.descending,
                    Ordering::Less => query.descending,
                    Ordering::Equal => false,
                };
                matches
                    .iter()
                    .position(|(position, _)| after(position))
                    .unwrap_or(matches.len())
            }
            None => 0,
        };

        let remaining = &matches[start..];
        let take = query
            .limit
            .map_or(remaining.len(), |limit| remaining.len().min(limit as usize));
        let page = &remaining[..take];

        let last_evaluated_key = if take < remaining.len() {
            page.last()
                .map(|(_, item)| last_evaluated_key(item, range_attribute))
        } else {
            None
        };

        let items = page
            .iter()
            .map(|(_, item)| project(item, query.projection.as_deref()))
            .collect();

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }

    async fn count(&self, partition: &str) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        state.take_transient()?;

        if state.faults.count_partitions.contains(partition) {
            return Err(StoreError::Request(format!(
                "injected count failure for {}",
                partition
            )));
        }

        Ok(state
            .items
            .range((partition.to_string(), String::new())..)
            .take_while(|((pk, _), _)| pk == partition)
            .count())
    }

    async fn batch_put(&self, items: Vec<Item>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.take_transient()?;

        for item in items {
            let key = owned_key(&item)?;
            state.items.insert(key, item);
        }
        Ok(())
    }
}

fn owned_key(item: &Item) -> Result<(String, String), StoreError> {
    primary_key(item)
        .map(|(pk, sk)| (pk.to_string(), sk.to_string()))
        .ok_or_else(|| StoreError::Request("Missing key attributes".to_string()))
}

fn string_attribute<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    item.get(name)?.as_s().ok().map(String::as_str)
}

fn start_position(start_key: &Item, range_attribute: &str) -> Result<Position, StoreError> {
    let (_, sk) = owned_key(start_key)?;
    let range_key = string_attribute(start_key, range_attribute)
        .ok_or_else(|| {
            StoreError::Request(format!("Exclusive start key is missing {}", range_attribute))
        })?
        .to_string();
    Ok((range_key, sk))
}

fn last_evaluated_key(item: &Item, range_attribute: &str) -> Item {
    [keys::PK, keys::SK, range_attribute]
        .into_iter()
        .filter_map(|name| Some((name.to_string(), item.get(name)?.clone())))
        .collect()
}

fn project(item: &Item, projection: Option<&[&'static str]>) -> Item {
    match projection {
        None => item.clone(),
        Some(attributes) => attributes
            .iter()
            .filter_map(|name| Some((name.to_string(), item.get(*name)?.clone())))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::types::AttributeValue;

    use super::*;

    fn s(value: &str) -> AttributeValue {
        AttributeValue::S(value.to_string())
    }

    fn item(pk: &str, sk: &str, lsi: Option<&str>) -> Item {
        let mut item = Item::from([
            (keys::PK.to_string(), s(pk)),
            (keys::SK.to_string(), s(sk)),
        ]);
        if let Some(lsi) = lsi {
            item.insert(keys::SK_LSI1.to_string(), s(lsi));
        }
        item
    }

    fn sk_of(item: &Item) -> &str {
        item.get(keys::SK).unwrap().as_s().unwrap()
    }

    #[tokio::test]
    async fn test_put_if_absent_rejects_existing_key() {
        let table = InMemoryTable::new();

        table.put_if_absent(item("TAG", "TAG#go", None)).await.unwrap();
        let result = table.put_if_absent(item("TAG", "TAG#go", None)).await;

        assert_eq!(result, Err(StoreError::ConditionFailed));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_transaction_is_atomic_on_duplicate_keys() {
        let table = InMemoryTable::new();

        let result = table
            .transact_write(vec![
                WriteOp::Put(item("POST", "POST#a", None)),
                WriteOp::Put(item("POST", "POST#a", None)),
            ])
            .await;

        assert!(matches!(result, Err(StoreError::Request(_))));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_transaction_rejects_too_many_items() {
        let table = InMemoryTable::new();
        let ops = (0..=MAX_TRANSACTION_ITEMS)
            .map(|i| WriteOp::Put(item("POST", &format!("POST#{i}"), None)))
            .collect();

        let result = table.transact_write(ops).await;

        assert!(matches!(result, Err(StoreError::Request(_))));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_injected_transaction_failure_after_successes() {
        let table = InMemoryTable::new();
        table.fail_transactions_after(1).await;

        let first = table
            .transact_write(vec![WriteOp::Put(item("POST", "POST#a", None))])
            .await;
        let second = table
            .transact_write(vec![WriteOp::Put(item("POST", "POST#b", None))])
            .await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(StoreError::TransactionCanceled(_))));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_query_index_is_sparse_and_ordered() {
        let table = InMemoryTable::new();
        table.insert_raw(item("POST", "POST#b", Some("CREATED_AT#2024-02#POST#b"))).await;
        table.insert_raw(item("POST", "POST#a", Some("CREATED_AT#2024-01#POST#a"))).await;
        table.insert_raw(item("POST", "POST#c", None)).await;
        table.insert_raw(item("TAG", "TAG#go", None)).await;

        let page = table
            .query(TableQuery::partition("POST").on_index(keys::LSI1).descending())
            .await
            .unwrap();

        let sks: Vec<&str> = page.items.iter().map(sk_of).collect();
        assert_eq!(sks, vec!["POST#b", "POST#a"]);
        assert!(page.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_pages_with_exclusive_start_key() {
        let table = InMemoryTable::new();
        for (slug, month) in [("a", "01"), ("b", "02"), ("c", "03")] {
            table
                .insert_raw(item(
                    "POST",
                    &format!("POST#{slug}"),
                    Some(&format!("CREATED_AT#2024-{month}#POST#{slug}")),
                ))
                .await;
        }

        let query = TableQuery::partition("POST")
            .on_index(keys::LSI1)
            .descending()
            .limit(2);
        let first = table.query(query.clone()).await.unwrap();
        let lek = first.last_evaluated_key.clone().unwrap();
        assert_eq!(lek.len(), 3);

        let second = table.query(query.start_after(Some(lek))).await.unwrap();

        let first_sks: Vec<&str> = first.items.iter().map(sk_of).collect();
        let second_sks: Vec<&str> = second.items.iter().map(sk_of).collect();
        assert_eq!(first_sks, vec!["POST#c", "POST#b"]);
        assert_eq!(second_sks, vec!["POST#a"]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_prefix_and_projection() {
        let table = InMemoryTable::new();
        let mut tag = item("TAG", "TAG#go", None);
        tag.insert("slug".to_string(), s("go"));
        table.insert_raw(tag).await;
        table.insert_raw(item("TAG", "OTHER#x", None)).await;

        let page = table
            .query(TableQuery::partition("TAG").begins_with("TAG#").project(&["slug"]))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].len(), 1);
        assert_eq!(page.items[0].get("slug").unwrap().as_s().unwrap(), "go");
    }

    #[tokio::test]
    async fn test_count_only_counts_the_partition() {
        let table = InMemoryTable::new();
        table.insert_raw(item("TAG#go", "POST#a", None)).await;
        table.insert_raw(item("TAG#go", "POST#b", None)).await;
        table.insert_raw(item("TAG#gopher", "POST#a", None)).await;

        assert_eq!(table.count("TAG#go").await.unwrap(), 2);
        assert_eq!(table.count("TAG#rust").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_consumed() {
        let table = InMemoryTable::new();
        table.fail_transiently(1).await;

        assert!(matches!(
            table.count("TAG#go").await,
            Err(StoreError::Transient(_))
        ));
        assert_eq!(table.count("TAG#go").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_heal_clears_faults() {
        let table = InMemoryTable::new();
        table.fail_transactions().await;
        table.fail_count_for("TAG#go").await;
        table.heal().await;

        assert!(table.count("TAG#go").await.is_ok());
        assert!(table
            .transact_write(vec![WriteOp::Put(item("POST", "POST#a", None))])
            .await
            .is_ok());
    }
}
