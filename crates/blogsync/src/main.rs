mod app;
mod cdn;
mod config;
mod handlers;
mod state;
mod storage;

use std::sync::Arc;

use anyhow::Result;
use blogsync_core::storage::PostRepository;
use clap::Parser;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::{
    app::create_app,
    cdn::LoggingInvalidator,
    config::Config,
    state::AppState,
    storage::dynamodb::{DynamoDbRepository, RetryPolicy, RetryingStore},
};

/// Blogsync - Blog posts and tags served from a single DynamoDB table
#[derive(Parser, Debug)]
#[command(name = "blogsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "8080", env = "PORT")]
    port: u16,

    /// Create the table (and its index) before serving when it is missing
    #[arg(long, env = "ENSURE_TABLE")]
    ensure_table: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    let config = Config::from_env();
    let repo = build_repository(&config, cli.ensure_table).await?;
    let state = AppState::new(repo, Arc::new(LoggingInvalidator), config);

    let app = create_app(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Installs the global subscriber. `LOG_FORMAT=json` switches to one JSON
/// object per line for log shippers.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogsync=debug,tower_http=debug".into()),
        )
        .with(fmt_layer)
        .init();
}

fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy::default().with_max_retries(config.store_max_retries)
}

#[cfg(feature = "inmemory")]
async fn build_repository(config: &Config, ensure_table: bool) -> Result<Arc<dyn PostRepository>> {
    use crate::storage::inmemory::InMemoryTable;

    if ensure_table {
        tracing::info!("--ensure-table has no effect with the in-memory table");
    }
    tracing::info!(table = %config.table_name, "Using in-memory table");

    let store = RetryingStore::new(InMemoryTable::new(), retry_policy(config));
    Ok(Arc::new(
        DynamoDbRepository::new(store).with_tag_count_concurrency(config.tag_count_concurrency),
    ))
}

#[cfg(feature = "dynamodb")]
async fn build_repository(config: &Config, ensure_table: bool) -> Result<Arc<dyn PostRepository>> {
    use crate::storage::dynamodb::{
        create_client,
        schema::{blogsync_table_config, ensure_table as create_table_if_missing},
        AwsConfig, DynamoDbStore,
    };

    let aws = AwsConfig {
        endpoint_url: config.endpoint_url.clone(),
        region: config.region.clone(),
    };
    tracing::info!(table = %config.table_name, target = %aws.target_display(), "Using DynamoDB");

    let client = create_client(&aws).await;

    if ensure_table {
        let table = blogsync_table_config().with_table_name(&config.table_name);
        create_table_if_missing(&client, &table).await?;
    }

    let store = RetryingStore::new(
        DynamoDbStore::new(client, config.table_name.clone()),
        retry_policy(config),
    );
    Ok(Arc::new(
        DynamoDbRepository::new(store).with_tag_count_concurrency(config.tag_count_concurrency),
    ))
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
