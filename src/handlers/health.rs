use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::state::AppState;

// liveness plus a glance at the gateway's working set
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "cacheSize": state.gateway.cache_len(),
        "inflight": state.gateway.inflight_len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
