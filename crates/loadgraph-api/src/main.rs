//! loadgraph server binary.
//!
//! Serves the users/posts API with per-request batch loading.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! loadgraph --config config.yaml
//!
//! # With environment variables only
//! LOADGRAPH_STORAGE__BACKEND=sqlite LOADGRAPH_STORAGE__DATABASE_URL=sqlite://loadgraph.db loadgraph
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use loadgraph_api::http::{create_router_with_observability, AppState, RouterOptions};
use loadgraph_api::observability::{init_logging, init_metrics, LoggingConfig, MetricsState};
use loadgraph_domain::resolver::PassConfig;
use loadgraph_server::config::StorageBackend;
use loadgraph_server::ServerConfig;
use loadgraph_storage::{seed, DataStore, MemoryDataStore, SqliteConfig, SqliteDataStore};

/// loadgraph - users and posts over a batching, deduplicating loader
#[derive(Parser, Debug)]
#[command(name = "loadgraph")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::from_env()?,
    };

    init_logging(&LoggingConfig::from(&config.logging));
    info!(version = env!("CARGO_PKG_VERSION"), "Starting loadgraph server");

    let metrics_state = if config.metrics.enabled {
        let state = init_metrics()?;
        info!(path = %config.metrics.path, "Metrics enabled");
        state
    } else {
        MetricsState::detached()
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage backend");
            let storage = Arc::new(MemoryDataStore::new());
            serve(storage, addr, &config, metrics_state).await
        }
        StorageBackend::Sqlite => {
            let database_url = config.storage.database_url.clone().ok_or_else(|| {
                anyhow::anyhow!("storage.database_url is required for sqlite backend")
            })?;

            info!("Opening SQLite database");
            let sqlite_config = SqliteConfig {
                database_url,
                max_connections: config.storage.pool_size,
                connect_timeout_secs: config.storage.connection_timeout_secs,
                ..Default::default()
            };
            let storage = SqliteDataStore::from_config(&sqlite_config).await?;

            info!("Running database migrations");
            storage.run_migrations().await?;

            serve(Arc::new(storage), addr, &config, metrics_state).await
        }
    }
}

/// Seeds the store if configured, then serves HTTP until a shutdown signal.
async fn serve<S: DataStore>(
    storage: Arc<S>,
    addr: SocketAddr,
    config: &ServerConfig,
    metrics_state: MetricsState,
) -> anyhow::Result<()> {
    if config.storage.seed {
        seed(storage.as_ref()).await?;
    } else {
        warn!("Sample data seeding disabled; serving existing rows");
    }

    let pass_config = PassConfig::default().with_max_batch_size(config.loader.max_batch_size);
    let state = AppState::with_pass_config(storage, pass_config);
    let options = RouterOptions::from_settings(&config.server, &config.metrics);
    let request_timeout = options.request_timeout;
    let router = create_router_with_observability(state, metrics_state, options);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, ?request_timeout, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that fails to install is logged
/// and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_parsing() {
        let args = Args::try_parse_from(["loadgraph"]).unwrap();
        assert!(args.config.is_none());

        let args = Args::try_parse_from(["loadgraph", "--config", "config.yaml"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("config.yaml"));

        let args = Args::try_parse_from(["loadgraph", "-c", "test.yaml"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("test.yaml"));
    }
}
