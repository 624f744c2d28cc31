use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use weasyl_stats_core::{AggregateStore, AnalyticsSource, PiwikClient, PostgresStore};
use weasyl_stats_query::{
    build_router, AppState, QueryMetricsCollector, QueryRegistry, QueryService, StatsConfig,
};

/// Weasyl stats query service
#[derive(Debug, Parser)]
#[command(name = "weasyl-stats-query", version, about)]
struct Args {
    /// YAML or JSON configuration file
    #[arg(long, env = "WEASYL_STATS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the configuration file
    #[arg(long, env = "WEASYL_STATS_LISTEN")]
    listen: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        return;
    }
    info!("Shutdown signal received, stopping server");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut config = StatsConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.bind_address = listen;
    }
    info!(
        "Loaded configuration: bind {}, database {}@{}:{}/{}",
        config.bind_address,
        config.postgres.user,
        config.postgres.host,
        config.postgres.port,
        config.postgres.dbname
    );

    let store: Arc<dyn AggregateStore> = Arc::new(
        PostgresStore::new(config.postgres.clone())
            .await
            .context("Failed to connect to the database")?,
    );
    let analytics: Arc<dyn AnalyticsSource> = Arc::new(
        PiwikClient::new(config.analytics.clone()).context("Failed to build analytics client")?,
    );

    let metrics = Arc::new(QueryMetricsCollector::new());
    let registry = QueryRegistry::standard(store.clone(), analytics);
    let query_service = QueryService::new(registry, store, metrics.clone())
        .with_ttl(config.cache_ttl())
        .with_producer_timeout(config.producer_timeout());

    let state = AppState {
        query_service: Arc::new(query_service),
        metrics,
    };
    let app = build_router(state, &config.static_dir);

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    let addr = listener.local_addr()?;
    info!("Weasyl stats query service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
