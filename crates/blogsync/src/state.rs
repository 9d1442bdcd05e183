//! Shared application state.
//!
//! Handlers see storage and the CDN only through trait objects, so the same
//! router runs against DynamoDB in production and the in-memory table in
//! tests.

use std::sync::Arc;

use blogsync_core::storage::PostRepository;

use crate::{cdn::CdnInvalidator, config::Config};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn PostRepository>,
    pub cdn: Arc<dyn CdnInvalidator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        cdn: Arc<dyn CdnInvalidator>,
        config: Config,
    ) -> Self {
        Self {
            repo,
            cdn,
            config: Arc::new(config),
        }
    }
}
