//! Counting stand-ins for the external model services.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use estimate_gateway::UpstreamError;
use estimate_gateway::client::{
    ContentRequest, ContentResponse, GenerativeModel, InlineData, OperationHandle, VideoModel,
    VideoRequest,
};

type Reply = Box<dyn Fn() -> Result<ContentResponse, UpstreamError> + Send + Sync>;

pub struct StubModel {
    calls: AtomicUsize,
    delay: Duration,
    reply: Reply,
    requests: Mutex<Vec<ContentRequest>>,
}

impl StubModel {
    pub fn new(reply: impl Fn() -> Result<ContentResponse, UpstreamError> + Send + Sync + 'static) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            reply: Box::new(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move || {
            Ok(ContentResponse {
                text: Some(text.clone()),
                inline_data: None,
            })
        })
    }

    pub fn image(mime_type: &'static str, data: &'static [u8]) -> Self {
        Self::new(move || {
            Ok(ContentResponse {
                text: None,
                inline_data: Some(InlineData::new(mime_type, Bytes::from_static(data))),
            })
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ContentRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerativeModel for StubModel {
    async fn generate_content(
        &self,
        request: &ContentRequest,
    ) -> Result<ContentResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.reply)()
    }
}

pub fn quote_json(name: &str) -> String {
    serde_json::json!({
        "projectName": name,
        "summary": "Full kitchen refresh",
        "totalEstimatedCostMin": 18000,
        "totalEstimatedCostMax": 26000,
        "currency": "USD",
        "breakdown": [
            { "description": "Cabinets", "estimatedCost": 9000, "category": "Materials" },
            { "description": "Install", "estimatedCost": 6000, "category": "Labor" }
        ],
        "timeline": [
            { "phaseName": "Demolition", "duration": "1 week", "estimatedCost": 2000,
              "description": "Strip old kitchen", "tasks": ["Remove cabinets"] }
        ],
        "materials": ["Quartz", "Oak"],
        "designStyleSuggestions": ["Matte black hardware"]
    })
    .to_string()
}

/// Video job that finishes after `done_after` polls (never when `None`).
pub struct StubVideo {
    pub done_after: Option<u32>,
    pub result_uri: Option<String>,
    pub operation_error: Option<String>,
    pub fail_submit: bool,
    pub fail_fetch: bool,
    pub polls: AtomicU32,
    pub fetches: AtomicU32,
}

impl StubVideo {
    pub fn finishing_after(polls: u32) -> Self {
        Self {
            done_after: Some(polls),
            result_uri: Some("https://files.example/video-1".to_string()),
            operation_error: None,
            fail_submit: false,
            fail_fetch: false,
            polls: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
        }
    }

    pub fn never_finishing() -> Self {
        Self {
            done_after: None,
            ..Self::finishing_after(0)
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoModel for StubVideo {
    async fn submit(&self, _request: &VideoRequest) -> Result<OperationHandle, UpstreamError> {
        if self.fail_submit {
            return Err(UpstreamError::MissingCredential);
        }
        Ok(OperationHandle {
            name: "operations/video-1".to_string(),
            ..Default::default()
        })
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationHandle, UpstreamError> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        let done = self.done_after.is_some_and(|after| polls >= after);
        Ok(OperationHandle {
            name: handle.name.clone(),
            done,
            result_uri: if done { self.result_uri.clone() } else { None },
            error: if done { self.operation_error.clone() } else { None },
        })
    }

    async fn fetch_artifact(&self, _uri: &str) -> Result<Bytes, UpstreamError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(UpstreamError::Status {
                status: 403,
                body: "forbidden".to_string(),
            });
        }
        Ok(Bytes::from_static(b"mp4-bytes"))
    }
}
