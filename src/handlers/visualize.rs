use axum::{Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ImageBody, decode_base64};
use crate::models::ImageSize;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizeRequest {
    pub prompt: String,
    pub style: String,
    #[serde(default)]
    pub image_size: ImageSize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    // base64 PNG of the current rendering
    pub image: String,
    pub edit_prompt: String,
}

pub async fn visualize_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VisualizeRequest>,
) -> Result<Json<ImageBody>, ApiError> {

    let image = state
        .gateway
        .visualize(&payload.prompt, &payload.style, payload.image_size)
        .await?;
    Ok(Json(image.into()))
}

pub async fn edit_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EditRequest>,
) -> Result<Json<ImageBody>, ApiError> {
    let original = decode_base64("image", &payload.image)?;

    let image = state
        .gateway
        .edit_visualization(&original, &payload.edit_prompt)
        .await?;
    Ok(Json(image.into()))
}
