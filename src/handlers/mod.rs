mod admin;
mod analyze;
mod health;
mod metrics;
mod video;
mod visualize;

pub use admin::{clear_cache_handler, stats_handler};
pub use analyze::{analyze_handler, batch_handler, describe_handler, narration_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use video::video_handler;
pub use visualize::{edit_handler, visualize_handler};

use axum::{
    Json, Router,
    extract::{ConnectInfo, DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::client::InlineData;
use crate::error::{ErrorKind, GenerationError};
use crate::state::AppState;

// uploads are photos, short videos and audio clips
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // every route that reaches a model is rate limited
    let generation_routes = Router::new()
        .route("/api/analyze", post(analyze_handler))
        .route("/api/analyze/batch", post(batch_handler))
        .route("/api/narration", post(narration_handler))
        .route("/api/describe", post(describe_handler))
        .route("/api/visualize", post(visualize_handler))
        .route("/api/visualize/edit", post(edit_handler))
        .route("/api/video", post(video_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/cache", delete(clear_cache_handler))
        .merge(generation_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// Error body sent to the UI
#[derive(Debug)]
pub enum ApiError {
    Generation(GenerationError),
    BadRequest(String),
    RateLimited,
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        ApiError::Generation(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: String,
    detail: String,
    retryable: bool,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::Upstream
        | ErrorKind::InvalidResponse
        | ErrorKind::EmptyResponse
        | ErrorKind::DownloadFailed => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Generation(err) => (
                status_for(err.kind),
                ErrorBody {
                    kind: err.kind.as_str().to_string(),
                    retryable: err.is_retryable(),
                    detail: err.detail,
                },
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    kind: "bad_request".to_string(),
                    detail,
                    retryable: false,
                },
            ),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    kind: "rate_limited".to_string(),
                    detail: "Rate limit exceeded. Try again later.".to_string(),
                    retryable: true,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

// Rate limit keyed on the peer address (needs connect info on the server)
async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = state.rate_limiter.client_key(request.headers(), peer);

    if !state.rate_limiter.check(&key) {
        warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(request).await)
}

// base64 field from a JSON body, data URLs accepted
pub(crate) fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match value.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => value,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::BadRequest(format!("{} is not valid base64: {}", field, e)))
}

// Image returned to the UI
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBody {
    pub mime_type: String,
    pub data: String,
}

impl From<InlineData> for ImageBody {
    fn from(image: InlineData) -> Self {
        Self {
            mime_type: image.mime_type,
            data: STANDARD.encode(&image.data),
        }
    }
}
