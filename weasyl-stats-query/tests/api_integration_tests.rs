//! API Integration tests for the Weasyl stats query service
//!
//! These drive the public HTTP router against in-memory store and analytics
//! doubles, covering the full request/response cycle without a database or
//! network access.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::DateTime;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use weasyl_stats_core::mock::{MockAnalytics, MockStore};
use weasyl_stats_core::{PageUrlRecord, Scalar};
use weasyl_stats_query::{
    build_router, queries, AppState, QueryMetricsCollector, QueryRegistry, QueryService,
};

struct TestApp {
    router: axum::Router,
    store: Arc<MockStore>,
    analytics: Arc<MockAnalytics>,
}

fn create_test_app(store: MockStore, analytics: MockAnalytics, static_dir: &Path) -> TestApp {
    let store = Arc::new(store);
    let analytics = Arc::new(analytics);
    let metrics = Arc::new(QueryMetricsCollector::new());

    let registry = QueryRegistry::standard(store.clone(), analytics.clone());
    let query_service = QueryService::new(registry, store.clone(), metrics.clone())
        .with_producer_timeout(Duration::from_secs(5));

    let state = AppState {
        query_service: Arc::new(query_service),
        metrics,
    };

    TestApp {
        router: build_router(state, static_dir),
        store,
        analytics,
    }
}

fn default_app() -> TestApp {
    create_test_app(
        MockStore::new(),
        MockAnalytics::default(),
        Path::new("static"),
    )
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router.clone().oneshot(get(uri)).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[cfg(test)]
mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let app = default_app();
        let (status, json) = send(&app.router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["service"], "weasyl-stats-query");
        assert_eq!(json["status"], "healthy");
        assert!(json.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn test_unknown_query_is_bad_query() {
        let app = default_app();
        let (status, json) = send(&app.router, "/query?query=drop_tables").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "error": "bad query" }));
        assert_eq!(app.store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_and_empty_query_are_bad_query() {
        let app = default_app();

        for uri in ["/query", "/query?query=", "/query?other=genders"] {
            let (status, json) = send(&app.router, uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert_eq!(json, json!({ "error": "bad query" }), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_repeated_query_parameter_uses_first() {
        let store =
            MockStore::new().with_result(queries::GENDERS, vec![vec![Scalar::from("male")]]);
        let app = create_test_app(store, MockAnalytics::default(), Path::new("static"));

        let (status, json) = send(&app.router, "/query?query=genders&query=nope").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "result": [["male"]] }));

        let (status, json) = send(&app.router, "/query?query=nope&query=genders").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "error": "bad query" }));
    }

    #[tokio::test]
    async fn test_bad_query_content_type_is_json() {
        let app = default_app();
        let response = app.router.clone().oneshot(get("/query")).await.unwrap();

        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, "application/json");
    }

    #[tokio::test]
    async fn test_store_query_result_and_cache_hit() {
        let store = MockStore::new().with_result(
            queries::GENDERS,
            vec![
                vec![Scalar::from("female"), Scalar::Integer(120)],
                vec![Scalar::from("male"), Scalar::Integer(80)],
            ],
        );
        let app = create_test_app(store, MockAnalytics::default(), Path::new("static"));

        let (status, first) = send(&app.router, "/query?query=genders").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, json!({ "result": [["female", 120], ["male", 80]] }));
        assert_eq!(app.store.query_count(), 1);

        let (status, second) = send(&app.router, "/query?query=genders").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second, first);
        assert_eq!(app.store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_values_are_serialized_for_json() {
        let timestamp = DateTime::parse_from_rfc3339("2020-01-01T12:00:00+05:00").unwrap();
        let store = MockStore::new().with_result(
            queries::USERS_BY_DAY,
            vec![vec![
                Scalar::from(timestamp),
                Scalar::Duration(chrono::TimeDelta::seconds(90)),
                Scalar::Null,
            ]],
        );
        let app = create_test_app(store, MockAnalytics::default(), Path::new("static"));

        let (status, json) = send(&app.router, "/query?query=users_by_day").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "result": [["2020-01-01T12:00:00", 90.0, null]] }));
    }

    #[tokio::test]
    async fn test_producer_failure_returns_500() {
        let app = create_test_app(
            MockStore::new().with_error_simulation(),
            MockAnalytics::default(),
            Path::new("static"),
        );

        let (status, json) = send(&app.router, "/query?query=ages").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "query failed");
        assert_eq!(json["category"], "database");
        assert!(json["message"].as_str().unwrap().contains("simulated"));

        // Nothing was cached, so the next request runs the query again.
        send(&app.router, "/query?query=ages").await;
        assert_eq!(app.store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_favorites_vs_view_time() {
        let analytics = MockAnalytics::new(vec![
            PageUrlRecord::new("42", Scalar::Integer(30), Scalar::Integer(5)),
            PageUrlRecord::new("not-a-number", Scalar::Integer(11), Scalar::Integer(2)),
            PageUrlRecord::new("7", Scalar::Integer(60), Scalar::Integer(9)),
        ]);
        let store = MockStore::new().with_favorites([(42, 3)]);
        let app = create_test_app(store, analytics, Path::new("static"));

        let (status, json) = send(&app.router, "/query?query=favorites_vs_view_time").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "result": [[42, 30, 5, 3], [7, 11, 2, 0]] }));

        send(&app.router, "/query?query=favorites_vs_view_time").await;
        assert_eq!(app.analytics.call_count(), 1);
    }

    #[tokio::test]
    async fn test_analytics_failure_returns_500() {
        let app = create_test_app(
            MockStore::new(),
            MockAnalytics::default().with_error_simulation(),
            Path::new("static"),
        );

        let (status, json) = send(&app.router, "/query?query=favorites_vs_view_time").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["category"], "analytics");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_returns_prometheus_format() {
        let store = MockStore::new().with_result(queries::AGES, vec![vec![Scalar::Integer(1)]]);
        let app = create_test_app(store, MockAnalytics::default(), Path::new("static"));

        send(&app.router, "/query?query=ages").await;
        send(&app.router, "/query?query=ages").await;
        send(&app.router, "/query?query=nope").await;

        let response = app.router.clone().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("weasyl_stats_requests_total 3"));
        assert!(text.contains("weasyl_stats_bad_queries_total 1"));
        assert!(text.contains("weasyl_stats_cache_hits_total 1"));
        assert!(text.contains("weasyl_stats_cache_misses_total 1"));
        assert!(text.contains("weasyl_stats_producer_runs_total 1"));
    }

    #[tokio::test]
    async fn test_static_files_are_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>stats</h1>").unwrap();
        let store = MockStore::new().with_result(queries::TICKETS, vec![]);
        let app = create_test_app(store, MockAnalytics::default(), dir.path());

        let response = app
            .router
            .clone()
            .oneshot(get("/static/index.html"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"<h1>stats</h1>");

        let missing = app
            .router
            .clone()
            .oneshot(get("/static/missing.js"))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let (status, json) = send(&app.router, "/query?query=tickets").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "result": [] }));
    }
}
