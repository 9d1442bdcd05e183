//! [`TableStore`] backed by a real DynamoDB table.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeValue, Delete, Put, PutRequest, Select, TransactWriteItem, WriteRequest,
};
use aws_sdk_dynamodb::Client;

use super::error::{map_build_error, map_sdk_error, map_transaction_error};
use super::keys;
use super::store::{
    Item, QueryPage, StoreError, TableQuery, TableStore, WriteOp, MAX_BATCH_WRITE_ITEMS,
};

/// Times a batch write chunk is resent while the table reports unprocessed items.
const MAX_UNPROCESSED_RETRIES: u32 = 5;
const UNPROCESSED_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Where to find DynamoDB.
#[derive(Debug, Clone, Default)]
pub struct AwsConfig {
    /// Custom endpoint, e.g. DynamoDB Local. `None` targets AWS.
    pub endpoint_url: Option<String>,
    /// `None` lets the SDK resolve the region from its default chain.
    pub region: Option<String>,
}

impl AwsConfig {
    pub fn target_display(&self) -> String {
        match (&self.endpoint_url, &self.region) {
            (Some(url), _) => format!("Local DynamoDB ({})", url),
            (None, Some(region)) => format!("AWS DynamoDB (region: {})", region),
            (None, None) => "AWS DynamoDB (default region)".to_string(),
        }
    }
}

/// Builds an SDK client using the default credential chain.
pub async fn create_client(config: &AwsConfig) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    let sdk_config = loader.load().await;
    Client::new(&sdk_config)
}

/// DynamoDB-based table store.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn transact_item(&self, op: WriteOp) -> Result<TransactWriteItem, StoreError> {
        let item = match op {
            WriteOp::Put(item) => TransactWriteItem::builder()
                .put(
                    Put::builder()
                        .table_name(&self.table_name)
                        .set_item(Some(item))
                        .build()
                        .map_err(map_build_error)?,
                )
                .build(),
            WriteOp::Delete(key) => TransactWriteItem::builder()
                .delete(
                    Delete::builder()
                        .table_name(&self.table_name)
                        .set_key(Some(key))
                        .build()
                        .map_err(map_build_error)?,
                )
                .build(),
        };
        Ok(item)
    }

    async fn write_chunk(&self, chunk: Vec<Item>) -> Result<(), StoreError> {
        let mut pending = chunk
            .into_iter()
            .map(|item| {
                PutRequest::builder()
                    .set_item(Some(item))
                    .build()
                    .map(|put| WriteRequest::builder().put_request(put).build())
                    .map_err(map_build_error)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut attempt: u32 = 0;

        loop {
            let output = self
                .client
                .batch_write_item()
                .request_items(&self.table_name, std::mem::take(&mut pending))
                .send()
                .await
                .map_err(map_sdk_error)?;

            pending = output
                .unprocessed_items
                .and_then(|mut unprocessed| unprocessed.remove(&self.table_name))
                .unwrap_or_default();
            if pending.is_empty() {
                return Ok(());
            }

            attempt += 1;
            if attempt > MAX_UNPROCESSED_RETRIES {
                return Err(StoreError::Transient(format!(
                    "{} items left unprocessed after {} attempts",
                    pending.len(),
                    attempt
                )));
            }

            tracing::debug!(
                unprocessed = pending.len(),
                attempt,
                "Resubmitting unprocessed batch write items"
            );
            tokio::time::sleep(UNPROCESSED_RETRY_DELAY * 2u32.pow(attempt - 1)).await;
        }
    }
}

#[async_trait]
impl TableStore for DynamoDbStore {
    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", keys::PK)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let items = ops
            .into_iter()
            .map(|op| self.transact_item(op))
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(map_transaction_error)?;

        Ok(())
    }

    async fn get(&self, key: Item) -> Result<Option<Item>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key))
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(result.item)
    }

    async fn query(&self, query: TableQuery) -> Result<QueryPage, StoreError> {
        let range_attribute = match query.index {
            Some(keys::LSI1) => keys::SK_LSI1,
            _ => keys::SK,
        };

        let mut condition = "#pk = :pk".to_string();
        let mut request = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(query.index.map(str::to_string))
            .expression_attribute_names("#pk", keys::PK)
            .expression_attribute_values(":pk", AttributeValue::S(query.partition))
            .scan_index_forward(!query.descending)
            .set_limit(query.limit.map(|limit| i32::try_from(limit).unwrap_or(i32::MAX)))
            .set_exclusive_start_key(query.exclusive_start_key);

        if let Some(prefix) = query.sort_key_prefix {
            condition.push_str(" AND begins_with(#sk, :prefix)");
            request = request
                .expression_attribute_names("#sk", range_attribute)
                .expression_attribute_values(":prefix", AttributeValue::S(prefix));
        }

        if let Some(attributes) = &query.projection {
            let mut placeholders = Vec::with_capacity(attributes.len());
            for (i, attribute) in attributes.iter().enumerate() {
                let placeholder = format!("#p{}", i);
                request = request.expression_attribute_names(&placeholder, *attribute);
                placeholders.push(placeholder);
            }
            request = request.projection_expression(placeholders.join(", "));
        }

        let result = request
            .key_condition_expression(condition)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(QueryPage {
            items: result.items.unwrap_or_default(),
            last_evaluated_key: result.last_evaluated_key,
        })
    }

    async fn count(&self, partition: &str) -> Result<usize, StoreError> {
        let mut total = 0usize;
        let mut start_key = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", keys::PK)
                .expression_attribute_values(":pk", AttributeValue::S(partition.to_string()))
                .select(Select::Count)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(map_sdk_error)?;

            total += usize::try_from(result.count).unwrap_or(0);

            match result.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => return Ok(total),
            }
        }
    }

    async fn batch_put(&self, items: Vec<Item>) -> Result<(), StoreError> {
        for chunk in items.chunks(MAX_BATCH_WRITE_ITEMS) {
            self.write_chunk(chunk.to_vec()).await?;
        }
        Ok(())
    }
}
