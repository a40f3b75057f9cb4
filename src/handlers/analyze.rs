use axum::{Json, extract::State};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, decode_base64};
use crate::models::{BatchAnalysis, BatchImage, NarrationAnalysis, ProjectInputs, Quote};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    // base64 photo or video
    pub media: String,
    pub mime_type: String,
    pub inputs: ProjectInputs,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImageRequest {
    pub data: String,
    pub mime_type: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub images: Vec<BatchImageRequest>,
    pub inputs: ProjectInputs,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationRequest {
    pub audio: String,
    pub mime_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeRequest {
    pub quote: Quote,
    pub prompt: String,
    pub style: String,
}

pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<Quote>, ApiError> {
    let media = decode_base64("media", &payload.media)?;

    let quote = state
        .gateway
        .analyze(&media, &payload.mime_type, &payload.inputs)
        .await?;
    Ok(Json(Quote::clone(&quote)))
}

pub async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchRequest>,
) -> Result<Json<BatchAnalysis>, ApiError> {
    if payload.images.is_empty() {
        return Err(ApiError::BadRequest("at least one image is required".to_string()));
    }

    let images = payload
        .images
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            let data = decode_base64(&format!("images[{}]", index), &image.data)?;
            Ok(BatchImage {
                data: Bytes::from(data),
                mime_type: image.mime_type,
                label: image.label,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let analysis = state.gateway.analyze_batch(&images, &payload.inputs).await?;
    Ok(Json(analysis))
}

pub async fn narration_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NarrationRequest>,
) -> Result<Json<NarrationAnalysis>, ApiError> {
    let audio = decode_base64("audio", &payload.audio)?;

    let analysis = state
        .gateway
        .analyze_narration(&audio, &payload.mime_type)
        .await?;
    Ok(Json(analysis))
}

pub async fn describe_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DescribeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {

    let description = state
        .gateway
        .describe_quote(&payload.quote, &payload.prompt, &payload.style)
        .await?;
    Ok(Json(serde_json::json!({ "description": description })))
}
