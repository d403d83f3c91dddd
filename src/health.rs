//! # Operational HTTP Surface
//!
//! `GET /health` and `GET /metrics`, out of the core bridging path but wired
//! alongside it using axum's standard `Router`/`serve` pairing; shut down
//! cooperatively via the same `CancellationToken` the other tasks use.

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::BridgeError;

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics() -> String {
    // This crate ships only the `Metrics` port; a real exporter would be
    // wired in here by the binary that owns the registry.
    String::new()
}

/// Serve `/health` and `/metrics` until `cancel` fires.
pub async fn serve(port: u16, cancel: CancellationToken) -> Result<(), BridgeError> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BridgeError::Fatal(format!("cannot bind health endpoint on {addr}: {e}")))?;

    info!(%addr, "health endpoint listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| BridgeError::transient("health_server", e))?;
    Ok(())
}
