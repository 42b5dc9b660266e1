//! HTTP surface for the oracle.
//!
//! This module provides:
//! - Configuration types (`config`)
//! - The API route handlers (`routes`)
//! - [`build_router`] and [`serve`] to run the whole surface
//!
//! Routes:
//! - `POST /api/reading` — run one interpretation request
//! - `GET /api/cache/stats` — cache counter snapshot
//! - `POST /api/cache/stats?action=reset` — zero the counters
//! - `GET /metrics` — plain-text metrics exposition
//! - `GET /health` — liveness probe

pub mod config;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::info;

use crate::Oracle;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub oracle: Arc<Oracle>,
}

/// Build the axum router with all API routes.
pub fn build_router(oracle: Arc<Oracle>) -> Router {
    let state = AppState { oracle };
    Router::new()
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics))
        .route("/api/reading", post(routes::create_reading))
        .route(
            "/api/cache/stats",
            get(routes::cache_stats).post(routes::cache_stats_action),
        )
        .with_state(state)
}

/// Serve the API on `listener` until interrupted, then stop the oracle's
/// background work.
pub async fn serve(listener: TcpListener, oracle: Arc<Oracle>) -> std::io::Result<()> {
    let router = build_router(Arc::clone(&oracle));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    oracle.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
