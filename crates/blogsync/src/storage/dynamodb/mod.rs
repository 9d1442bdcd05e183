//! Single-table DynamoDB storage.
//!
//! The repository, the codec and the store seam are always compiled; the
//! in-memory backend runs the same repository. The SDK-backed store and
//! table provisioning need the `dynamodb` feature.

pub mod conversions;
pub mod keys;
mod repository;
mod retry;
pub mod store;

#[cfg(feature = "dynamodb")]
mod client;
#[cfg(feature = "dynamodb")]
mod error;
#[cfg(feature = "dynamodb")]
pub mod schema;

pub use repository::DynamoDbRepository;
pub use retry::{RetryPolicy, RetryingStore};

#[cfg(feature = "dynamodb")]
pub use client::{create_client, AwsConfig, DynamoDbStore};
