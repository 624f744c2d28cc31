use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::AppState;

/// Health check endpoint
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "weasyl-stats-query",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.prometheus_format(),
    )
}

/// Named query endpoint: `GET /query?query=<name>`
///
/// Unknown or missing names are answered with `{"error": "bad query"}` and a
/// 200 status; only a failing producer turns into an error status. When the
/// parameter is repeated the first occurrence is used.
pub async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let name = params
        .iter()
        .find(|(key, _)| key == "query")
        .map(|(_, value)| value.as_str());
    debug!("Received query request: {:?}", name);

    match state.query_service.execute(name).await {
        Ok(outcome) => {
            debug!("Answering {:?} (cached: {})", name, outcome.is_cached());
            Ok(Json(outcome.into_body()))
        }
        Err(err) => {
            error!("Query {:?} failed: {}", name, err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "query failed",
                    "message": err.to_string(),
                    "category": err.category()
                })),
            ))
        }
    }
}
