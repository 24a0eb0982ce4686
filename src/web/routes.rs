//! Route definitions

use super::handlers;
use super::limiter;
use super::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut api = Router::new()
        .route("/api/query", post(handlers::query))
        .route("/api/batch", post(handlers::batch))
        .route("/api/stats", get(handlers::stats));

    if let Some(inbound) = state.limiter.clone() {
        api = api.route_layer(middleware::from_fn_with_state(inbound, limiter::limit));
    }

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::config::Settings;
    use crate::decision::DecisionAgent;
    use crate::orchestrator::Orchestrator;
    use crate::ratelimit::{RateLimiter, RateLimiterSet};
    use crate::sources::test_utils::StaticSource;
    use crate::sources::{SourceId, SourceRegistry};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(limiter: bool, requests_per_minute: u32) -> Router {
        let mut settings = Settings::default();
        settings.server.limiter = limiter;
        settings.server.requests_per_minute = requests_per_minute;

        let registry = SourceId::ALL
            .into_iter()
            .fold(SourceRegistry::new(), |r, id| r.with(Arc::new(StaticSource::new(id))));
        let limiters = SourceId::ALL
            .into_iter()
            .fold(RateLimiterSet::new(), |set, id| set.with(id, RateLimiter::new(100, 1.0)));

        let orchestrator = Orchestrator::new(
            settings.orchestrator.clone(),
            DecisionAgent::new(),
            Arc::new(limiters),
            Arc::new(CacheManager::new("source", 100, Duration::from_secs(60))),
            Arc::new(registry),
        );

        create_router(AppState::new(settings, orchestrator))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_endpoint() {
        let response = app(false, 0)
            .oneshot(post_json(
                "/api/query",
                serde_json::json!({"query": "NCT01234567 status"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["decision"]["intent"], "trial_lookup");
        assert_eq!(body["decision"]["confidence"], 0.95);
        assert_eq!(body["results"]["clinical_trials"]["status"], "success");
        assert_eq!(body["metadata"]["pii_report"]["detected"], false);
    }

    #[tokio::test]
    async fn test_query_reports_pii() {
        let response = app(false, 0)
            .oneshot(post_json(
                "/api/query",
                serde_json::json!({"query": "ibuprofen dose, contact me at jane@example.com"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metadata"]["pii_report"]["detected"], true);
        assert_eq!(body["metadata"]["pii_report"]["types"][0], "email");
    }

    #[tokio::test]
    async fn test_invalid_query_is_400() {
        let response = app(false, 0)
            .oneshot(post_json("/api/query", serde_json::json!({"query": "ab"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_batch_endpoint() {
        let response = app(false, 0)
            .oneshot(post_json(
                "/api/batch",
                serde_json::json!({
                    "queries": ["aspirin and stroke", "x", "metformin dosage"],
                    "options": {"concurrency": 2}
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metadata"]["total"], 3);
        assert_eq!(body["metadata"]["failed"], 1);
        assert_eq!(body["results"][1]["error"], "invalid_input");
        assert_eq!(body["errors"][0]["index"], 1);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_400() {
        let queries: Vec<String> = (0..101).map(|i| format!("aspirin {}", i)).collect();
        let response = app(false, 0)
            .oneshot(post_json("/api/batch", serde_json::json!({"queries": queries})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let app = app(false, 0);

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["cache"]["durable"], "disabled");
        assert_eq!(
            body["services"]["external_apis"]["sources"]["pubmed"]["status"],
            "healthy"
        );

        let response = app
            .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metrics"]["total_queries"], 0);
    }

    #[tokio::test]
    async fn test_inbound_limiter() {
        let app = app(true, 1);

        let first = app
            .clone()
            .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .clone()
            .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // health stays reachable
        let health = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
