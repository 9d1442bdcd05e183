use std::{env, time::Duration};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// DynamoDB table name (default: "blogsync")
    pub table_name: String,
    /// Custom DynamoDB endpoint, e.g. DynamoDB Local
    #[cfg_attr(not(feature = "dynamodb"), allow(dead_code))]
    pub endpoint_url: Option<String>,
    /// AWS region; the SDK default chain is used when unset
    #[cfg_attr(not(feature = "dynamodb"), allow(dead_code))]
    pub region: Option<String>,
    /// Page size when a listing request has no `limit` (default: 6)
    pub default_page_size: u32,
    /// Largest accepted `limit` (default: 100)
    pub max_page_size: u32,
    /// Tag count queries in flight at once (default: 16)
    pub tag_count_concurrency: usize,
    /// Retries of a transient store failure (default: 3)
    pub store_max_retries: u32,
    /// Origins allowed by CORS; empty allows any origin
    pub allowed_origins: Vec<String>,
    /// Request timeout in seconds (default: 10)
    pub request_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DYNAMODB_TABLE_NAME` - Table name (default: "blogsync")
    /// - `AWS_ENDPOINT_URL` - Custom DynamoDB endpoint (default: unset)
    /// - `AWS_REGION` - AWS region (default: unset)
    /// - `DEFAULT_PAGE_SIZE` - Default listing page size (default: 6)
    /// - `MAX_PAGE_SIZE` - Maximum listing page size (default: 100)
    /// - `TAG_COUNT_CONCURRENCY` - Concurrent tag count queries (default: 16)
    /// - `STORE_MAX_RETRIES` - Retries of transient store errors (default: 3)
    /// - `ALLOWED_ORIGINS` - Comma separated CORS origins (default: any)
    /// - `REQUEST_TIMEOUT_SECONDS` - Request timeout (default: 10)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_page_size = parse_var(&lookup, "MAX_PAGE_SIZE", 100u32).max(1);

        Self {
            table_name: lookup("DYNAMODB_TABLE_NAME").unwrap_or_else(|| "blogsync".to_string()),
            endpoint_url: non_empty_var(&lookup, "AWS_ENDPOINT_URL"),
            region: non_empty_var(&lookup, "AWS_REGION"),
            default_page_size: parse_var(&lookup, "DEFAULT_PAGE_SIZE", 6u32).clamp(1, max_page_size),
            max_page_size,
            tag_count_concurrency: parse_var(&lookup, "TAG_COUNT_CONCURRENCY", 16usize).max(1),
            store_max_retries: parse_var(&lookup, "STORE_MAX_RETRIES", 3),
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
            request_timeout_seconds: parse_var(&lookup, "REQUEST_TIMEOUT_SECONDS", 10),
        }
    }

    /// Get the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    lookup(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
