//! In-memory storage backend.
//!
//! This module provides an in-memory implementation of the [`TableStore`]
//! capability that stores all items in a `BTreeMap` wrapped in
//! `Arc<RwLock<_>>`. The repository runs on top of it unchanged, which makes
//! it the backend for tests and for local development without a table.
//!
//! # Example
//!
//! ```rust,ignore
//! use blogsync::storage::dynamodb::DynamoDbRepository;
//! use blogsync::storage::inmemory::InMemoryTable;
//!
//! let repo = DynamoDbRepository::new(InMemoryTable::new());
//! ```
//!
//! [`TableStore`]: crate::storage::dynamodb::store::TableStore

mod table;

pub use table::InMemoryTable;
