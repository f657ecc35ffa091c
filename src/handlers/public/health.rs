// handlers/public/health.rs - GET /health

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": state.sessions.clock().now(),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}
