//! Retry decorator for [`TableStore`].
//!
//! Wraps any store and retries calls that fail with [`StoreError::Transient`]
//! using exponential backoff with jitter. Every other error is returned on
//! the first attempt, so a failed condition check or a canceled transaction
//! is never replayed.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::store::{Item, QueryPage, StoreError, TableQuery, TableStore, WriteOp};

/// How many times and how fast transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.initial_delay, self.max_delay, self.multiplier)
    }
}

/// Exponential backoff with ±25% jitter.
#[derive(Debug)]
struct ExponentialBackoff {
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            max,
            multiplier,
            current: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(
            self.max,
            Duration::from_secs_f64(self.current.as_secs_f64() * self.multiplier),
        );
        let jitter = rand::random::<f64>() * 0.5 - 0.25;
        Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter))
    }
}

/// A [`TableStore`] that retries transient failures of the wrapped store.
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: TableStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut backoff = self.policy.backoff();
        let mut attempt: u32 = 0;

        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<S: TableStore> TableStore for RetryingStore<S> {
    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError> {
        let inner = &self.inner;
        self.run("put_if_absent", move || inner.put_if_absent(item.clone()))
            .await
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let inner = &self.inner;
        self.run("transact_write", move || inner.transact_write(ops.clone()))
            .await
    }

    async fn get(&self, key: Item) -> Result<Option<Item>, StoreError> {
        let inner = &self.inner;
        self.run("get", move || inner.get(key.clone())).await
    }

    async fn query(&self, query: TableQuery) -> Result<QueryPage, StoreError> {
        let inner = &self.inner;
        self.run("query", move || inner.query(query.clone())).await
    }

    async fn count(&self, partition: &str) -> Result<usize, StoreError> {
        let inner = &self.inner;
        self.run("count", move || inner.count(partition)).await
    }

    async fn batch_put(&self, items: Vec<Item>) -> Result<(), StoreError> {
        let inner = &self.inner;
        self.run("batch_put", move || inner.batch_put(items.clone()))
            .await
    }
}
