use axum::{Json, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Landing target for non-API redirects.
pub async fn index() -> &'static str {
    "warden"
}
