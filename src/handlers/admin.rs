use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use crate::state::AppState;
use crate::stats::UsageStats;

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<UsageStats> {
    Json(state.gateway.stats())
}

pub async fn clear_cache_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.gateway.clear_cache();
    StatusCode::NO_CONTENT
}
