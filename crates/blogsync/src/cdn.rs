//! CDN cache invalidation.
//!
//! Writes that change what readers see ask the CDN to drop its cached copies
//! of the blog routes. Invalidation is advisory: a failure is logged and never
//! fails the write that triggered it.

use async_trait::async_trait;
use thiserror::Error;

/// Path pattern covering every cached blog response.
pub const BLOG_PATHS: &str = "/blog/*";

#[derive(Debug, Error)]
pub enum InvalidationError {
    #[cfg_attr(not(test), allow(dead_code))]
    #[error("CDN invalidation failed: {0}")]
    Failed(String),
}

/// Trait for CDN cache invalidation.
#[async_trait]
pub trait CdnInvalidator: Send + Sync {
    /// Invalidates every cached response matching `path`.
    async fn invalidate(&self, path: &str) -> Result<(), InvalidationError>;
}

/// Invalidator that only records the request in the log.
///
/// Used when no CDN sits in front of the service.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInvalidator;

#[async_trait]
impl CdnInvalidator for LoggingInvalidator {
    async fn invalidate(&self, path: &str) -> Result<(), InvalidationError> {
        tracing::info!(%path, "CDN invalidation requested");
        Ok(())
    }
}

/// Invalidates [`BLOG_PATHS`], logging instead of returning a failure.
pub async fn invalidate_blog(invalidator: &dyn CdnInvalidator) {
    if let Err(err) = invalidator.invalidate(BLOG_PATHS).await {
        tracing::warn!(error = %err, path = BLOG_PATHS, "Ignoring CDN invalidation failure");
    }
}
