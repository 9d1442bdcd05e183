//! Storage backend implementations.
//!
//! This module provides the implementation of the `PostRepository` trait
//! defined in `blogsync_core::storage`. The repository always runs on the
//! single-table layout; what differs between backends is the table it talks
//! to, selected at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-process table emulation, no AWS access needed
//! - `dynamodb`: AWS DynamoDB table using `aws-sdk-dynamodb`
//!
//! These features are mutually exclusive - only one storage backend can be
//! enabled at a time.
//!
//! # Examples
//!
//! Build with the in-memory table (default):
//! ```bash
//! cargo build -p blogsync
//! ```
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p blogsync --no-default-features --features dynamodb
//! ```

// Compile-time checks for mutual exclusivity
#[cfg(all(feature = "inmemory", feature = "dynamodb"))]
compile_error!(
    "Features 'inmemory' and 'dynamodb' are mutually exclusive. \
    Enable only one storage backend at a time."
);

#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No storage backend selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p blogsync --features inmemory"
);

pub mod dynamodb;

#[cfg(any(test, feature = "inmemory"))]
pub mod inmemory;
