//! HTTP request handlers

use super::pii;
use super::state::AppState;
use crate::error::Error;
use crate::orchestrator::BatchOptions;
use crate::query::QueryContext;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

/// Body of `POST /api/query`
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub context: QueryContext,
}

/// Body of `POST /api/batch`
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub queries: Vec<String>,
    #[serde(default)]
    pub options: BatchOptions,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "invalid_input",
                    "message": message,
                })),
            )
                .into_response(),
        }
    }
}

/// Attach the receive time and this text's PII report
fn prepare_context(mut context: QueryContext, text: &str) -> QueryContext {
    context.timestamp.get_or_insert_with(Utc::now);
    context.with_pii_report(pii::detect(text))
}

/// Single query handler
pub async fn query(State(state): State<AppState>, Json(body): Json<QueryRequest>) -> Response {
    let context = prepare_context(body.context, &body.query);
    match state.orchestrator.process_query(&body.query, context).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Batch handler
pub async fn batch(State(state): State<AppState>, Json(body): Json<BatchRequest>) -> Response {
    let BatchOptions {
        concurrency,
        context,
    } = body.options;

    let items = body
        .queries
        .into_iter()
        .map(|text| {
            let context = prepare_context(context.clone(), &text);
            (text, context)
        })
        .collect();

    match state.orchestrator.process_batch_with(items, concurrency).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Health check
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.health_check().await)
}

/// Metrics snapshot
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "instance_name": state.instance_name(),
        "version": crate::VERSION,
        "metrics": state.orchestrator.metrics().snapshot(),
    }))
}
