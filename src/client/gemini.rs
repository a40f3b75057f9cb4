//! Generative Language REST client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{
    ContentRequest, ContentResponse, GenerativeModel, InlineData, OperationHandle, Part,
    VideoModel, VideoRequest,
};
use crate::error::UpstreamError;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL of the API, without a trailing slash
    pub base_url: String,
    /// API key; calls fail with `MissingCredential` when absent
    pub api_key: Option<String>,
    /// Model used for analysis, images and text
    pub model: String,
    /// Model used for long-running video jobs
    pub video_model: String,
    /// Transport-level timeout, longer than any gateway deadline
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    fn api_key(&self) -> Result<&str, UpstreamError> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(UpstreamError::MissingCredential),
        }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    // key travels in a header so it never lands in a URL
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, UpstreamError> {
        Ok(request.header(API_KEY_HEADER, self.api_key()?))
    }

    async fn check(response: Response) -> Result<Response, UpstreamError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(UpstreamError::Status { status, body })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, UpstreamError> {
        let body = Self::check(response).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(
        &self,
        request: &ContentRequest,
    ) -> Result<ContentResponse, UpstreamError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base(),
            self.config.model
        );
        let builder = self.authorized(self.http.post(&url))?;
        debug!("Sending generateContent request for model {}", self.config.model);

        let response = builder.json(&WireRequest::from(request)).send().await?;
        let body: WireResponse = Self::read_json(response).await?;
        Ok(body.into_content())
    }
}

#[async_trait]
impl VideoModel for GeminiClient {
    async fn submit(&self, request: &VideoRequest) -> Result<OperationHandle, UpstreamError> {
        let builder = self.authorized(self.http.post(format!(
            "{}/v1beta/models/{}:predictLongRunning",
            self.base(),
            self.config.video_model
        )))?;
        let mut instance = serde_json::json!({ "prompt": request.prompt });
        if let Some(image) = &request.seed_image {
            instance["image"] = serde_json::json!({
                "bytesBase64Encoded": STANDARD.encode(&image.data),
                "mimeType": image.mime_type,
            });
        }
        let body = serde_json::json!({
            "instances": [instance],
            "parameters": {
                "aspectRatio": request.aspect_ratio,
                "resolution": request.resolution,
                "sampleCount": request.count,
            },
        });

        let response = builder.json(&body).send().await?;
        let operation: WireOperation = Self::read_json(response).await?;
        Ok(operation.into_handle())
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationHandle, UpstreamError> {
        let url = format!("{}/v1beta/{}", self.base(), handle.name);
        let builder = self.authorized(self.http.get(&url))?;

        let response = builder.send().await?;
        let operation: WireOperation = Self::read_json(response).await?;
        Ok(operation.into_handle())
    }

    async fn fetch_artifact(&self, uri: &str) -> Result<Bytes, UpstreamError> {
        let key = self.api_key()?;
        let separator = if uri.contains('?') { '&' } else { '?' };
        let url = format!("{}{}key={}", uri, separator, key);

        // file downloads only take the key as a query parameter
        let response = Self::check(self.http.get(&url).send().await?).await?;
        Ok(response.bytes().await?)
    }
}

// generateContent request body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    generation_config: WireGenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireBlob>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

impl From<&ContentRequest> for WireRequest {
    fn from(request: &ContentRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart {
                    text: Some(text.clone()),
                    inline_data: None,
                },
                Part::Inline(inline) => WirePart {
                    text: None,
                    inline_data: Some(WireBlob {
                        mime_type: inline.mime_type.clone(),
                        data: STANDARD.encode(&inline.data),
                    }),
                },
            })
            .collect();

        let system_instruction = request.system_instruction.as_ref().map(|text| WireContent {
            parts: vec![WirePart {
                text: Some(text.clone()),
                inline_data: None,
            }],
        });

        let config = &request.config;
        Self {
            contents: vec![WireContent { parts }],
            system_instruction,
            generation_config: WireGenerationConfig {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
                response_mime_type: config.response_mime_type.clone(),
                response_schema: config.response_schema.clone(),
            },
        }
    }
}

// generateContent response body
#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Deserialize)]
struct WireCandidate {
    #[serde(default)]
    content: WireContent,
}

impl WireResponse {
    fn into_content(self) -> ContentResponse {
        let parts = self
            .candidates
            .into_iter()
            .next()
            .map(|candidate| candidate.content.parts)
            .unwrap_or_default();

        let mut text: Option<String> = None;
        let mut inline_data = None;
        for part in parts {
            if let Some(chunk) = part.text {
                text.get_or_insert_with(String::new).push_str(&chunk);
            }
            if inline_data.is_none() {
                inline_data = part.inline_data.and_then(|blob| {
                    // undecodable image data is treated as missing
                    STANDARD
                        .decode(blob.data.as_bytes())
                        .ok()
                        .map(|data| InlineData::new(blob.mime_type, data))
                });
            }
        }
        ContentResponse { text, inline_data }
    }
}

// long-running operation body
#[derive(Deserialize)]
struct WireOperation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    error: Option<WireStatus>,
}

#[derive(Deserialize)]
struct WireStatus {
    #[serde(default)]
    message: String,
}

impl WireOperation {
    fn into_handle(self) -> OperationHandle {
        let result_uri = self.response.as_ref().and_then(|response| {
            response
                .pointer("/generateVideoResponse/generatedSamples/0/video/uri")
                .or_else(|| response.pointer("/generatedVideos/0/video/uri"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        OperationHandle {
            name: self.name,
            done: self.done,
            result_uri,
            error: self.error.map(|status| status.message),
        }
    }
}
