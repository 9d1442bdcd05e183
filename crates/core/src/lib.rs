//! Functional core for blogsync.
//!
//! Pure domain types, validation, cursor encoding and the repository
//! contract. Nothing in this crate performs I/O.

pub mod post;
pub mod serde;
pub mod storage;
