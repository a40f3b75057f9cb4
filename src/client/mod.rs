//! Contracts for the external generative services.
//!
//! The gateway and poller only talk to these traits; `GeminiClient` is the
//! production implementation and tests plug in counting stand-ins.

mod gemini;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::UpstreamError;

pub use gemini::{GeminiClient, GeminiConfig};

/// Binary payload sent to or returned by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: Bytes,
}

impl InlineData {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Inline(InlineData),
    Text(String),
}

// Sampling and output-format settings for one call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentRequest {
    pub parts: Vec<Part>,
    pub system_instruction: Option<String>,
    pub config: GenerationConfig,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentResponse {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub prompt: String,
    pub seed_image: Option<InlineData>,
    pub resolution: String,
    pub aspect_ratio: String,
    pub count: u32,
}

/// Reference to a long-running video job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationHandle {
    pub name: String,
    pub done: bool,
    pub result_uri: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(
        &self,
        request: &ContentRequest,
    ) -> Result<ContentResponse, UpstreamError>;
}

#[async_trait]
pub trait VideoModel: Send + Sync {
    async fn submit(&self, request: &VideoRequest) -> Result<OperationHandle, UpstreamError>;

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationHandle, UpstreamError>;

    /// Download a finished artifact; implementations append their own credential.
    async fn fetch_artifact(&self, uri: &str) -> Result<Bytes, UpstreamError>;
}
