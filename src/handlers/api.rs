//! General API handlers

use axum::response::Json;
use serde_json::{Value, json};

/// Handler for GET / - Service health check.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "OK"
    }))
}
