//! Gemini `generateContent` client.
//!
//! ## Wire format
//!
//! ```text
//! POST {base}/v1beta/models/{model}:generateContent
//! x-goog-api-key: …
//!
//! { "contents": [{ "role": "user",
//!                  "parts": [ {inlineData}, …, {text} ] }],
//!   "generationConfig": { "responseModalities": ["TEXT","IMAGE"],
//!                         "imageConfig": { "aspectRatio": "16:9" } } }
//! ```
//!
//! Images come back base64-encoded as `inlineData` parts of the first
//! candidate, interleaved with text parts.

use super::provider::{ImageProvider, ImageRequest, ImageResponse, InlineImage};
use crate::config::ImageGenConfig;
use crate::error::ForgeError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Env vars consulted for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Reads the API key from `GEMINI_API_KEY`, then `GOOGLE_API_KEY`.
///
/// Empty values count as unset.
pub fn resolve_api_key() -> Result<String, ForgeError> {
    resolve_api_key_with(|var| std::env::var(var).ok())
}

fn resolve_api_key_with(lookup: impl Fn(&str) -> Option<String>) -> Result<String, ForgeError> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .ok_or(ForgeError::MissingApiKey)
}

/// HTTP implementation of [`ImageProvider`] for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ForgeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("docforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ForgeError::Internal(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            api_base: api_base.into(),
            timeout_secs,
        })
    }

    /// Builds a client from `config`, reading the key from the environment
    /// when the config carries none.
    pub fn from_config(config: &ImageGenConfig) -> Result<Self, ForgeError> {
        let key = match config.api_key.as_deref().map(str::trim) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => resolve_api_key()?,
        };
        Self::new(key, config.api_base.clone(), config.request_timeout_secs)
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse, ForgeError> {
        let model = request.model.id();
        let body = build_request_body(request);
        debug!(
            model,
            references = request.references.len(),
            prompt_chars = request.prompt.chars().count(),
            "POST generateContent"
        );

        let resp = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;
        debug!(status = status.as_u16(), bytes = text.len(), "generateContent answered");

        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &text, retry_after, model));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("unparseable response: {e}"),
            }
        })?;
        interpret_response(parsed)
    }
}

impl GeminiClient {
    fn transport_error(&self, e: reqwest::Error) -> ForgeError {
        if e.is_timeout() {
            ForgeError::ApiTimeout {
                secs: self.timeout_secs,
            }
        } else {
            ForgeError::Transport(e.to_string())
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

// ── Request / response mapping ───────────────────────────────────────────

fn build_request_body(request: &ImageRequest) -> GenerateContentRequest {
    let mut parts: Vec<RequestPart> = request
        .references
        .iter()
        .map(|img| RequestPart {
            text: None,
            inline_data: Some(InlineData {
                mime_type: img.mime_type.clone(),
                data: BASE64.encode(&img.data),
            }),
        })
        .collect();
    parts.push(RequestPart {
        text: Some(request.prompt.clone()),
        inline_data: None,
    });

    GenerateContentRequest {
        contents: vec![RequestContent { role: "user", parts }],
        generation_config: GenerationConfig {
            response_modalities: ["TEXT", "IMAGE"],
            image_config: request
                .aspect_ratio
                .as_ref()
                .map(|r| ImageConfig {
                    aspect_ratio: r.trim().to_string(),
                }),
        },
    }
}

fn mentions_block(s: &str) -> bool {
    let upper = s.to_ascii_uppercase();
    upper.contains("SAFETY") || upper.contains("BLOCK") || upper.contains("PROHIBITED")
}

fn interpret_response(resp: GenerateContentResponse) -> Result<ImageResponse, ForgeError> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ForgeError::ContentBlocked {
            detail: format!("prompt blocked: {reason}"),
        });
    }

    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Ok(ImageResponse::default());
    };

    let mut out = ImageResponse::default();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if part.thought {
            continue;
        }
        if let Some(inline) = part.inline_data {
            let data = BASE64
                .decode(inline.data.as_bytes())
                .map_err(|e| ForgeError::Internal(format!("invalid base64 image data: {e}")))?;
            out.images.push(InlineImage::new(inline.mime_type, data));
        } else if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            out.text.push(text);
        }
    }

    if out.images.is_empty() {
        if let Some(reason) = candidate.finish_reason.filter(|r| mentions_block(r)) {
            return Err(ForgeError::ContentBlocked {
                detail: format!("finish reason {reason}"),
            });
        }
    }
    Ok(out)
}

/// Maps a non-2xx answer to the matching [`ForgeError`].
fn classify_http_error(
    status: u16,
    body: &str,
    retry_after_secs: Option<u64>,
    model: &str,
) -> ForgeError {
    let (message, api_status, reasons) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let reasons: Vec<String> = env.error.details.into_iter().filter_map(|d| d.reason).collect();
            (env.error.message, env.error.status.unwrap_or_default(), reasons)
        }
        Err(_) => (body.chars().take(500).collect(), String::new(), Vec::new()),
    };
    let haystack = format!("{message} {api_status}").to_ascii_uppercase();
    // "API key not valid" and "API_KEY_INVALID" both normalise to "API KEY".
    let normalised = haystack.replace(['_', '-'], " ");

    if status == 401
        || status == 403
        || reasons.iter().any(|r| r.eq_ignore_ascii_case("API_KEY_INVALID"))
        || normalised.contains("API KEY")
        || haystack.contains("AUTHENTICATION")
    {
        return ForgeError::AuthError { detail: message };
    }
    if status == 429 {
        return ForgeError::RateLimitExceeded {
            model: model.to_string(),
            retry_after_secs,
        };
    }
    if haystack.contains("SAFETY") || haystack.contains("BLOCKED") {
        return ForgeError::ContentBlocked { detail: message };
    }
    ForgeError::ApiError { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageModel;
    use serde_json::json;

    #[test]
    fn api_key_prefers_gemini_then_google() {
        let key = resolve_api_key_with(|v| match v {
            "GEMINI_API_KEY" => Some("g1".into()),
            "GOOGLE_API_KEY" => Some("g2".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "g1");

        let key = resolve_api_key_with(|v| match v {
            "GEMINI_API_KEY" => Some("   ".into()),
            "GOOGLE_API_KEY" => Some("g2".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "g2");

        assert!(matches!(
            resolve_api_key_with(|_| None),
            Err(ForgeError::MissingApiKey)
        ));
    }

    #[test]
    fn request_body_puts_references_before_prompt() {
        let mut req = ImageRequest::new(ImageModel::Pro, "a lighthouse at dusk");
        req.references.push(InlineImage::new("image/png", vec![1, 2, 3]));
        req.aspect_ratio = Some("16:9".into());

        let v = serde_json::to_value(build_request_body(&req)).unwrap();
        let parts = &v["contents"][0]["parts"];
        assert_eq!(v["contents"][0]["role"], "user");
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], BASE64.encode([1u8, 2, 3]));
        assert!(parts[0].get("text").is_none());
        assert_eq!(parts[1]["text"], "a lighthouse at dusk");
        assert_eq!(
            v["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
        assert_eq!(v["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
    }

    #[test]
    fn request_body_omits_image_config_without_ratio() {
        let req = ImageRequest::new(ImageModel::Flash, "cat");
        let v = serde_json::to_value(build_request_body(&req)).unwrap();
        assert!(v["generationConfig"].get("imageConfig").is_none());
    }

    fn parse(v: serde_json::Value) -> Result<ImageResponse, ForgeError> {
        interpret_response(serde_json::from_value(v).unwrap())
    }

    #[test]
    fn response_splits_text_and_images() {
        let r = parse(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is your image" },
                    { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(b"PNGDATA") } },
                    { "text": "thinking…", "thought": true }
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(r.images.len(), 1);
        assert_eq!(r.images[0].data, b"PNGDATA");
        assert_eq!(r.text, vec!["Here is your image".to_string()]);
    }

    #[test]
    fn block_reason_is_content_blocked() {
        let e = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).unwrap_err();
        assert!(matches!(e, ForgeError::ContentBlocked { .. }));

        let e = parse(json!({
            "candidates": [{ "finishReason": "PROHIBITED_CONTENT" }]
        }))
        .unwrap_err();
        assert!(matches!(e, ForgeError::ContentBlocked { .. }));
    }

    #[test]
    fn text_only_response_is_not_an_error_here() {
        let r = parse(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't draw that" }] }, "finishReason": "STOP" }]
        }))
        .unwrap();
        assert!(r.images.is_empty());
        assert_eq!(r.joined_text().as_deref(), Some("I can't draw that"));
    }

    #[test]
    fn http_errors_are_classified() {
        let bad_key = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_http_error(400, bad_key, None, "m"),
            ForgeError::AuthError { .. }
        ));
        let with_reason = r#"{"error":{"code":400,"message":"Request rejected.","status":"INVALID_ARGUMENT",
            "details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID","domain":"googleapis.com"}]}}"#;
        assert!(matches!(
            classify_http_error(400, with_reason, None, "m"),
            ForgeError::AuthError { .. }
        ));
        let key_invalid = r#"{"error":{"code":400,"message":"bad","status":"API_KEY_INVALID"}}"#;
        assert!(matches!(
            classify_http_error(400, key_invalid, None, "m"),
            ForgeError::AuthError { .. }
        ));
        assert!(matches!(
            classify_http_error(403, "forbidden", None, "m"),
            ForgeError::AuthError { .. }
        ));
        match classify_http_error(429, "{}", Some(7), "gemini-x") {
            ForgeError::RateLimitExceeded {
                model,
                retry_after_secs,
            } => {
                assert_eq!(model, "gemini-x");
                assert_eq!(retry_after_secs, Some(7));
            }
            other => panic!("unexpected {other:?}"),
        }
        let safety = r#"{"error":{"message":"Request blocked by SAFETY settings"}}"#;
        assert!(matches!(
            classify_http_error(400, safety, None, "m"),
            ForgeError::ContentBlocked { .. }
        ));
        match classify_http_error(503, "upstream overloaded", None, "m") {
            ForgeError::ApiError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream overloaded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let c = GeminiClient::new("k", "http://localhost:1234/", 5).unwrap();
        assert_eq!(
            c.endpoint("gemini-2.5-flash-image"),
            "http://localhost:1234/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }
}
