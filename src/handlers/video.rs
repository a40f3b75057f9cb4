use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, decode_base64};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequestBody {
    pub prompt: String,
    pub style: String,
    // optional base64 PNG to start the walkthrough from
    #[serde(default)]
    pub seed_image: Option<String>,
}

// Blocks until the job finishes; a dropped connection drops the poll loop
pub async fn video_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VideoRequestBody>,
) -> Result<Response, ApiError> {
    let seed_image = match payload.seed_image.as_deref() {
        Some(image) => Some(Bytes::from(decode_base64("seedImage", image)?)),
        None => None,
    };

    let artifact = state
        .poller
        .submit_and_await(&payload.prompt, &payload.style, seed_image)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::HeaderName::from_static("x-poll-attempts"),
                artifact.attempts.to_string(),
            ),
        ],
        artifact.bytes,
    )
        .into_response())
}
