//! Weasyl Stats Query Service Library
//!
//! Serves a fixed catalogue of named aggregate queries over HTTP, each
//! result cached in memory for a day, plus the static dashboard files.

pub mod cache;
pub mod composite;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod queries;
pub mod query_service;
pub mod registry;

use std::path::Path;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

// Re-export commonly used types
pub use config::StatsConfig;
pub use metrics::QueryMetricsCollector;
pub use query_service::{QueryOutcome, QueryService};
pub use registry::QueryRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub query_service: Arc<QueryService>,
    pub metrics: Arc<QueryMetricsCollector>,
}

/// Build the HTTP router: `/query`, `/health`, `/metrics` and the files
/// under `static_dir` mounted at `/static`.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/query", get(handlers::query_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
