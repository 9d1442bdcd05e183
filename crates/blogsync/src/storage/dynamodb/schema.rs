//! Table provisioning.
//!
//! [`TableConfig`] is a pure description of the table; [`ensure_table`] creates
//! it when it does not exist yet and waits for it to become active.

use std::time::Duration;

use aws_sdk_dynamodb::error::ProvideErrorMetadata;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, LocalSecondaryIndex, Projection,
    ProjectionType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client;
use thiserror::Error;

use super::keys;

const ACTIVATION_ATTEMPTS: u32 = 60;
const ACTIVATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Errors that can occur while provisioning the table.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    #[error("Timeout waiting for table '{0}' to become active")]
    ActivationTimeout(String),
}

/// Local secondary index: same partition key as the table, another sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIndexConfig {
    pub name: String,
    pub sort_key: String,
}

/// Key layout of the single table. Every key attribute is a string and the
/// table is billed per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table_name: String,
    pub partition_key: String,
    pub sort_key: String,
    pub local_indexes: Vec<LocalIndexConfig>,
}

impl TableConfig {
    pub fn with_table_name(mut self, name: &str) -> Self {
        self.table_name = name.to_string();
        self
    }

    /// Every attribute used in a key of the table or of an index, once each.
    pub fn key_attributes(&self) -> Vec<&str> {
        let mut attributes = vec![self.partition_key.as_str(), self.sort_key.as_str()];
        for index in &self.local_indexes {
            if !attributes.contains(&index.sort_key.as_str()) {
                attributes.push(index.sort_key.as_str());
            }
        }
        attributes
    }
}

/// Table layout used by the post repository.
pub fn blogsync_table_config() -> TableConfig {
    TableConfig {
        table_name: "blogsync".to_string(),
        partition_key: keys::PK.to_string(),
        sort_key: keys::SK.to_string(),
        local_indexes: vec![LocalIndexConfig {
            name: keys::LSI1.to_string(),
            sort_key: keys::SK_LSI1.to_string(),
        }],
    }
}

/// Creates the table unless it exists. Returns true when it was created.
pub async fn ensure_table(client: &Client, config: &TableConfig) -> Result<bool, SchemaError> {
    if table_status(client, &config.table_name).await?.is_some() {
        tracing::info!(table = %config.table_name, "Table already exists");
        return Ok(false);
    }

    tracing::info!(table = %config.table_name, "Creating table");
    match create_table(client, config).await {
        Ok(()) => {}
        // Another instance created it between the check and the create.
        Err(SchemaError::AwsSdk(message)) if message.contains("ResourceInUseException") => {
            return Ok(false)
        }
        Err(err) => return Err(err),
    }

    wait_for_table_active(client, &config.table_name).await?;
    tracing::info!(table = %config.table_name, "Table is active");
    Ok(true)
}

async fn create_table(client: &Client, config: &TableConfig) -> Result<(), SchemaError> {
    let attribute_definitions = config
        .key_attributes()
        .into_iter()
        .map(|name| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(|e| SchemaError::AwsSdk(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let key_schema = vec![
        key_element(&config.partition_key, KeyType::Hash)?,
        key_element(&config.sort_key, KeyType::Range)?,
    ];

    let mut request = client
        .create_table()
        .table_name(&config.table_name)
        .set_key_schema(Some(key_schema))
        .set_attribute_definitions(Some(attribute_definitions))
        .billing_mode(BillingMode::PayPerRequest);

    for index in &config.local_indexes {
        request = request.local_secondary_indexes(
            LocalSecondaryIndex::builder()
                .index_name(&index.name)
                .key_schema(key_element(&config.partition_key, KeyType::Hash)?)
                .key_schema(key_element(&index.sort_key, KeyType::Range)?)
                .projection(
                    Projection::builder()
                        .projection_type(ProjectionType::All)
                        .build(),
                )
                .build()
                .map_err(|e| SchemaError::AwsSdk(e.to_string()))?,
        );
    }

    request.send().await.map_err(|e| {
        let code = e.code().unwrap_or_default().to_string();
        SchemaError::AwsSdk(format!("{}: {}", code, e))
    })?;
    Ok(())
}

fn key_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement, SchemaError> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| SchemaError::AwsSdk(e.to_string()))
}

async fn table_status(client: &Client, table_name: &str) -> Result<Option<TableStatus>, SchemaError> {
    match client.describe_table().table_name(table_name).send().await {
        Ok(response) => Ok(response
            .table()
            .and_then(|table| table.table_status())
            .cloned()),
        Err(err) if err.code() == Some("ResourceNotFoundException") => Ok(None),
        Err(err) => Err(SchemaError::AwsSdk(err.to_string())),
    }
}

async fn wait_for_table_active(client: &Client, table_name: &str) -> Result<(), SchemaError> {
    for _ in 0..ACTIVATION_ATTEMPTS {
        if let Some(TableStatus::Active) = table_status(client, table_name).await? {
            return Ok(());
        }
        tokio::time::sleep(ACTIVATION_POLL_INTERVAL).await;
    }

    Err(SchemaError::ActivationTimeout(table_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blogsync_table_config() {
        let config = blogsync_table_config();

        assert_eq!(config.table_name, "blogsync");
        assert_eq!(config.partition_key, "PK");
        assert_eq!(config.sort_key, "SK");
        assert_eq!(config.local_indexes.len(), 1);
        assert_eq!(config.local_indexes[0].name, "LSI1");
        assert_eq!(config.local_indexes[0].sort_key, "SK_LSI1");
    }

    #[test]
    fn test_with_table_name() {
        let config = blogsync_table_config().with_table_name("blog-prod");
        assert_eq!(config.table_name, "blog-prod");
    }

    #[test]
    fn test_key_attributes_are_unique() {
        let mut config = blogsync_table_config();
        config.local_indexes.push(LocalIndexConfig {
            name: "LSI2".to_string(),
            sort_key: "SK_LSI1".to_string(),
        });

        assert_eq!(config.key_attributes(), vec!["PK", "SK", "SK_LSI1"]);
    }
}
