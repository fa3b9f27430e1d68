//! Gemini client and `generate_image` against a local mock of the
//! `generateContent` endpoint.

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use docforge::{
    generate_image, ForgeError, GeminiClient, ImageGenConfig, ImageModel, ImageProvider,
    ImageRequest,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

// ── Mock server ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Recorded {
    action: String,
    api_key: Option<String>,
    body: Value,
}

/// Canned answers, served in order; the last one repeats.
#[derive(Clone)]
struct MockState {
    answers: Arc<Mutex<VecDeque<(StatusCode, Vec<(&'static str, String)>, Value)>>>,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

async fn generate_content(
    State(state): State<MockState>,
    UrlPath(action): UrlPath<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.seen.lock().unwrap().push(Recorded {
        action,
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });
    let (status, extra_headers, payload) = {
        let mut answers = state.answers.lock().unwrap();
        if answers.len() > 1 {
            answers.pop_front().unwrap()
        } else {
            answers.front().cloned().unwrap()
        }
    };
    let mut resp = (status, Json(payload)).into_response();
    for (name, value) in extra_headers {
        resp.headers_mut().insert(name, value.parse().unwrap());
    }
    resp
}

/// Starts a mock on an ephemeral port; returns its base URL and state.
async fn start_mock(
    answers: Vec<(StatusCode, Vec<(&'static str, String)>, Value)>,
) -> (String, MockState) {
    let state = MockState {
        answers: Arc::new(Mutex::new(answers.into())),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1beta/models/:action", post(generate_content))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn tiny_png() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]))
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn image_answer(mime: &str, data: &[u8], text: Option<&str>) -> Value {
    let mut parts = Vec::new();
    if let Some(t) = text {
        parts.push(json!({ "text": t }));
    }
    parts.push(json!({
        "inlineData": {
            "mimeType": mime,
            "data": base64::engine::general_purpose::STANDARD.encode(data),
        }
    }));
    json!({ "candidates": [{ "content": { "parts": parts }, "finishReason": "STOP" }] })
}

fn ok(payload: Value) -> (StatusCode, Vec<(&'static str, String)>, Value) {
    (StatusCode::OK, Vec::new(), payload)
}

fn config_for(base: &str) -> ImageGenConfig {
    ImageGenConfig::builder()
        .api_key("test-key")
        .api_base(base)
        .retry_backoff_ms(1)
        .request_timeout_secs(10)
        .build()
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn generates_and_saves_png() {
    let png = tiny_png();
    let (base, state) = start_mock(vec![ok(image_answer(
        "image/png",
        &png,
        Some("Here is your crane."),
    ))])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("nested/crane.png");

    let config = ImageGenConfig::builder()
        .api_key("test-key")
        .api_base(base.as_str())
        .aspect_ratio("16:9")
        .build()
        .unwrap();
    let out = generate_image("A paper crane", &out_path, &config).await.unwrap();

    assert_eq!(out.images.len(), 1);
    assert_eq!(out.images[0].path, out_path);
    assert_eq!(std::fs::read(&out_path).unwrap(), png);
    assert_eq!(out.text.as_deref(), Some("Here is your crane."));
    assert_eq!(out.attempts, 1);

    let seen = state.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].action, "gemini-2.5-flash-image:generateContent");
    assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
    let body = &seen[0].body;
    assert_eq!(body["contents"][0]["parts"][0]["text"], "A paper crane");
    assert_eq!(
        body["generationConfig"]["responseModalities"],
        json!(["TEXT", "IMAGE"])
    );
    assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
}

#[tokio::test]
async fn jpeg_answer_rewrites_extension() {
    let (base, _) = start_mock(vec![ok(image_answer("image/jpeg", b"\xff\xd8\xff\xe0jpeg", None))]).await;
    let dir = tempfile::tempdir().unwrap();

    let out = generate_image("x", dir.path().join("pic.png"), &config_for(&base))
        .await
        .unwrap();
    assert_eq!(out.images[0].path, dir.path().join("pic.jpg"));
    assert!(dir.path().join("pic.jpg").exists());
    assert!(!dir.path().join("pic.png").exists());
}

#[tokio::test]
async fn references_precede_prompt() {
    let (base, state) = start_mock(vec![ok(image_answer("image/png", &tiny_png(), None))]).await;
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("ref.png");
    std::fs::write(&reference, tiny_png()).unwrap();

    let config = ImageGenConfig::builder()
        .api_key("k")
        .api_base(base.as_str())
        .reference(&reference)
        .reference(dir.path().join("missing.png"))
        .build()
        .unwrap();
    let out = generate_image("same character", dir.path().join("o.png"), &config)
        .await
        .unwrap();
    assert_eq!(out.references, [reference.clone()]);

    let seen = state.seen.lock().unwrap();
    let parts = seen[0].body["contents"][0]["parts"].as_array().unwrap().clone();
    assert_eq!(parts.len(), 2, "missing reference is skipped");
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[1]["text"], "same character");
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let (base, _) = start_mock(vec![(
        StatusCode::TOO_MANY_REQUESTS,
        vec![("retry-after", "7".to_string())],
        json!({ "error": { "code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED" } }),
    )])
    .await;
    let client = GeminiClient::new("k", base, 10).unwrap();
    let err = client
        .generate(&ImageRequest::new(ImageModel::Pro, "x"))
        .await
        .unwrap_err();
    match err {
        ForgeError::RateLimitExceeded {
            model,
            retry_after_secs,
        } => {
            assert_eq!(model, "gemini-3-pro-image-preview");
            assert_eq!(retry_after_secs, Some(7));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_is_auth_error_and_not_retried() {
    let (base, state) = start_mock(vec![(
        StatusCode::UNAUTHORIZED,
        Vec::new(),
        json!({ "error": { "code": 401, "message": "API key not valid", "status": "UNAUTHENTICATED" } }),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let err = generate_image("x", dir.path().join("o.png"), &config_for(&base))
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::AuthError { .. }));
    assert_eq!(state.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn server_error_is_retried_then_succeeds() {
    let (base, state) = start_mock(vec![
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Vec::new(),
            json!({ "error": { "code": 503, "message": "overloaded", "status": "UNAVAILABLE" } }),
        ),
        ok(image_answer("image/png", &tiny_png(), None)),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let out = generate_image("x", dir.path().join("o.png"), &config_for(&base))
        .await
        .unwrap();
    assert_eq!(out.attempts, 2);
    assert_eq!(state.seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn text_only_answer_is_no_image() {
    let (base, _) = start_mock(vec![ok(json!({
        "candidates": [{
            "content": { "parts": [{ "text": "I cannot draw that, but here is a description." }] },
            "finishReason": "STOP"
        }]
    }))])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let err = generate_image("x", dir.path().join("o.png"), &config_for(&base))
        .await
        .unwrap_err();
    match err {
        ForgeError::NoImageGenerated { text } => {
            assert!(text.unwrap().contains("here is a description"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!dir.path().join("o.png").exists());
}

#[tokio::test]
async fn blocked_prompt_is_content_blocked() {
    let (base, _) = start_mock(vec![ok(json!({
        "promptFeedback": { "blockReason": "SAFETY" }
    }))])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let err = generate_image("x", dir.path().join("o.png"), &config_for(&base))
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::ContentBlocked { .. }));
}
