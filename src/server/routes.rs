//! API route handlers.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::error;

use crate::types::ReadingRequest;
use crate::{SibylError, derive_identity};

use super::AppState;

/// POST /api/reading — run one interpretation request.
pub async fn create_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReadingRequest>,
) -> Response {
    let identity = identity_from_headers(&headers);
    match state.oracle.interpret(&identity, &request).await {
        Ok(reading) => (StatusCode::OK, Json(reading)).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/cache/stats — cache counter snapshot.
pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "cache": state.oracle.cache_stats(),
        "timestamp": Utc::now().timestamp(),
    }))
}

/// POST /api/cache/stats?action=reset — zero the counters. Any other or
/// missing action is refused.
pub async fn cache_stats_action(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match params.get("action").map(String::as_str) {
        Some("reset") => {
            state.oracle.reset_cache_stats();
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Cache statistics reset",
                    "timestamp": Utc::now().timestamp(),
                })),
            )
                .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Unknown action" })),
        )
            .into_response(),
    }
}

/// GET /metrics — plain-text metrics exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.oracle.export_metrics(),
    )
        .into_response()
}

/// GET /health — liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn identity_from_headers(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok());
    derive_identity(forwarded, real_ip)
}

fn error_response(err: SibylError) -> Response {
    match err {
        SibylError::Validation(message) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        SibylError::RateLimited { retry_after, .. } => {
            let retry_secs = retry_after.as_secs_f64().ceil() as u64;
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                Json(json!({
                    "error": "Rate limit exceeded",
                    "retryAfterSecs": retry_secs,
                })),
            )
                .into_response()
        }
        other => {
            error!(error = %other, "interpretation failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Narrative service unavailable" })),
            )
                .into_response()
        }
    }
}
