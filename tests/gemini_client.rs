use std::time::Duration;

use estimate_gateway::client::{
    ContentRequest, GenerativeModel, InlineData, OperationHandle, Part, VideoModel,
};
use estimate_gateway::{
    BackoffPolicy, ErrorKind, GeminiClient, GeminiConfig, GenerationError, JobPoller,
    UpstreamError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, api_key: Option<&str>) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        base_url: server.uri(),
        api_key: api_key.map(str::to_string),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

fn text_request() -> ContentRequest {
    ContentRequest {
        parts: vec![
            Part::Inline(InlineData::new("image/png", vec![1u8, 2, 3])),
            Part::Text("estimate this".to_string()),
        ],
        ..Default::default()
    }
}

#[tokio::test]
async fn generate_content_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "inlineData": { "mimeType": "image/png", "data": "AQID" } }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"ok\":true}" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server, Some("test-key"))
        .generate_content(&text_request())
        .await
        .unwrap();
    assert_eq!(response.text.as_deref(), Some("{\"ok\":true}"));
    assert!(response.inline_data.is_none());
}

#[tokio::test]
async fn generate_content_decodes_inline_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "iVBO" } }
            ] } }]
        })))
        .mount(&server)
        .await;

    let response = client(&server, Some("k"))
        .generate_content(&text_request())
        .await
        .unwrap();
    let image = response.inline_data.unwrap();
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(&image.data[..3], b"\x89PN");
}

#[tokio::test]
async fn error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = client(&server, Some("k"))
        .generate_content(&text_request())
        .await
        .unwrap_err();
    match err {
        UpstreamError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server, Some("k"))
        .generate_content(&text_request())
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Malformed(_)));
}

#[tokio::test]
async fn missing_key_never_calls_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, None)
        .generate_content(&text_request())
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::MissingCredential));

    let err = client(&server, Some(""))
        .poll(&OperationHandle::default())
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::MissingCredential));
}

#[tokio::test]
async fn video_job_runs_against_rest_api() {
    let server = MockServer::start().await;
    let video_uri = format!("{}/files/video-1:download?alt=media", server.uri());

    Mock::given(method("POST"))
        .and(path("/v1beta/models/veo-3.1-fast-generate-preview:predictLongRunning"))
        .and(header("x-goog-api-key", "k"))
        .and(body_partial_json(json!({
            "parameters": { "aspectRatio": "16:9", "resolution": "720p" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/op-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // first poll still running, then done
    Mock::given(method("GET"))
        .and(path("/v1beta/operations/op-1"))
        .and(header("x-goog-api-key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/op-1",
            "done": false
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/op-1",
            "done": true,
            "response": { "generateVideoResponse": { "generatedSamples": [
                { "video": { "uri": video_uri } }
            ] } }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/video-1:download"))
        .and(query_param("alt", "media"))
        .and(query_param("key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let policy = BackoffPolicy {
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        ..Default::default()
    };
    let poller = JobPoller::new(std::sync::Arc::new(client(&server, Some("k"))), policy);

    let artifact = poller
        .submit_and_await("sunroom", "Modern", None)
        .await
        .unwrap();
    assert_eq!(&artifact.bytes[..], b"mp4");
    assert_eq!(artifact.attempts, 2);
}

#[tokio::test]
async fn failed_video_download_maps_to_download_failed() {
    let server = MockServer::start().await;
    let video_uri = format!("{}/files/gone", server.uri());

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/op-2",
            "done": true,
            "response": { "generateVideoResponse": { "generatedSamples": [
                { "video": { "uri": video_uri } }
            ] } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let poller = JobPoller::new(
        std::sync::Arc::new(client(&server, Some("k"))),
        BackoffPolicy::default(),
    );
    let err = poller
        .submit_and_await("sunroom", "Modern", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DownloadFailed);
}

#[tokio::test]
async fn transport_errors_do_not_expose_api_key() {
    // nothing listens on port 1
    let client = GeminiClient::new(GeminiConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        api_key: Some("SUPERSECRETKEY".to_string()),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap();

    let err: GenerationError = client
        .generate_content(&text_request())
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.kind, ErrorKind::Upstream);
    assert!(!err.detail.contains("SUPERSECRETKEY"), "{}", err.detail);

    let err = client
        .poll(&OperationHandle {
            name: "operations/op-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(!err.to_string().contains("SUPERSECRETKEY"));

    // downloads put the key in the query string
    let err = client
        .fetch_artifact("http://127.0.0.1:1/files/video-1:download?alt=media")
        .await
        .unwrap_err();
    assert!(!err.to_string().contains("SUPERSECRETKEY"));
}
