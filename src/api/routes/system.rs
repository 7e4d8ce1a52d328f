//! System route handlers

use axum::{Json, response::IntoResponse};
use serde_json::json;

/// GET /health - Health check
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
