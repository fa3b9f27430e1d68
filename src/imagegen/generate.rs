//! Prompt → saved image, with retry.
//!
//! ## Retry Strategy
//!
//! Rate limits and 5xx answers from the image API are transient. Exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`) spaces the attempts out; with
//! a 1 s base and 2 retries the waits are 1 s → 2 s. A `Retry-After` hint on
//! a 429 raises the wait to at least that many seconds. Auth failures and
//! safety blocks are returned immediately.

use super::gemini::GeminiClient;
use super::provider::{ImageProvider, ImageRequest, ImageResponse, InlineImage};
use super::reference::load_reference_images;
use crate::config::ImageGenConfig;
use crate::error::ForgeError;
use crate::output::{write_output, GeneratedImage, GenerationOutput};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// Generates an image from `prompt` and saves it at (or next to) `output`.
///
/// The saved extension follows the MIME type the model returned, so
/// `output` may be rewritten from `.png` to `.jpg`. When the model returns
/// several images the extras are saved as `stem_2.ext`, `stem_3.ext`, ….
pub async fn generate_image(
    prompt: &str,
    output: impl AsRef<Path>,
    config: &ImageGenConfig,
) -> Result<GenerationOutput, ForgeError> {
    if prompt.trim().is_empty() {
        return Err(ForgeError::InvalidInput {
            input: "prompt".into(),
            reason: "prompt is empty".into(),
        });
    }
    let start = Instant::now();
    let provider = resolve_provider(config)?;

    let mut request = ImageRequest::new(config.model, prompt);
    let loaded = load_reference_images(&config.references).await;
    let references: Vec<PathBuf> = loaded.iter().map(|r| r.path.clone()).collect();
    request.references = loaded.into_iter().map(|r| r.image).collect();
    request.aspect_ratio = config.aspect_ratio.clone();

    info!(
        "Generating image with model {} via {} ({} reference(s))",
        config.model,
        provider.name(),
        request.references.len()
    );

    let (response, attempts) = request_with_retry(provider.as_ref(), &request, config).await?;
    let text = response.joined_text();
    if response.images.is_empty() {
        return Err(ForgeError::NoImageGenerated { text });
    }

    let images = save_images(&response.images, output.as_ref()).await?;
    Ok(GenerationOutput {
        images,
        text,
        model: config.model.id().to_string(),
        references,
        attempts,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// The injected provider, or a Gemini client built from `config`.
pub fn resolve_provider(config: &ImageGenConfig) -> Result<Arc<dyn ImageProvider>, ForgeError> {
    match &config.provider {
        Some(p) => Ok(Arc::clone(p)),
        None => Ok(Arc::new(GeminiClient::from_config(config)?)),
    }
}

/// Sends `request`, retrying transient failures.
///
/// Returns the response and the number of attempts made.
pub async fn request_with_retry(
    provider: &dyn ImageProvider,
    request: &ImageRequest,
    config: &ImageGenConfig,
) -> Result<(ImageResponse, u32), ForgeError> {
    let mut attempt: u32 = 0;
    loop {
        match provider.generate(request).await {
            Ok(resp) => return Ok((resp, attempt + 1)),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let backoff = backoff_delay(config.retry_backoff_ms, attempt, &e);
                warn!(
                    "{}: retry {}/{} after {}ms ({})",
                    provider.name(),
                    attempt,
                    config.max_retries,
                    backoff.as_millis(),
                    e
                );
                sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Longest pause between two attempts, whatever the server asks for.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Pause before retry number `attempt` (1-based): `base_ms * 2^(attempt-1)`,
/// raised to a rate limit's `Retry-After`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base_ms: u64, attempt: u32, error: &ForgeError) -> Duration {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    let mut ms = base_ms.saturating_mul(factor);
    if let ForgeError::RateLimitExceeded {
        retry_after_secs: Some(secs),
        ..
    } = error
    {
        ms = ms.max(secs.saturating_mul(1000));
    }
    Duration::from_millis(ms).min(MAX_BACKOFF)
}

/// Writes `images` starting at `output`, aligning each extension with its
/// MIME type.
pub async fn save_images(
    images: &[InlineImage],
    output: &Path,
) -> Result<Vec<GeneratedImage>, ForgeError> {
    let mut saved = Vec::with_capacity(images.len());
    for (i, img) in images.iter().enumerate() {
        let path = with_mime_extension(output, &img.mime_type);
        let path = if i == 0 { path } else { numbered_path(&path, i + 1) };
        write_output(&path, &img.data).await?;
        info!("Image saved to: {} ({} bytes)", path.display(), img.data.len());
        saved.push(GeneratedImage {
            path,
            mime_type: img.mime_type.clone(),
            bytes: img.data.len(),
        });
    }
    Ok(saved)
}

/// File extension (without dot) for a MIME type: `jpg`, `webp` or `png`.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let m = mime.to_ascii_lowercase();
    if m.contains("jpeg") || m.contains("jpg") {
        "jpg"
    } else if m.contains("webp") {
        "webp"
    } else {
        "png"
    }
}

/// `path` with its extension replaced unless it already ends with the one
/// matching `mime`.
pub fn with_mime_extension(path: &Path, mime: &str) -> PathBuf {
    let ext = extension_for_mime(mime);
    let already = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext));
    if already {
        path.to_path_buf()
    } else {
        path.with_extension(ext)
    }
}

fn numbered_path(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".into());
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    path.with_file_name(name)
}

/// `output/image_YYYYMMDD_HHMMSS.png` for the given local time.
pub fn default_output_path(now: NaiveDateTime) -> PathBuf {
    PathBuf::from("output").join(format!("image_{}.png", now.format("%Y%m%d_%H%M%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[test]
    fn mime_extension_rules() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/jpg"), "jpg");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");

        let p = Path::new("out/banner.png");
        assert_eq!(with_mime_extension(p, "image/jpeg"), PathBuf::from("out/banner.jpg"));
        assert_eq!(with_mime_extension(p, "image/png"), PathBuf::from("out/banner.png"));
        assert_eq!(
            with_mime_extension(Path::new("out/BANNER.PNG"), "image/png"),
            PathBuf::from("out/BANNER.PNG")
        );
        assert_eq!(
            with_mime_extension(Path::new("out/banner"), "image/webp"),
            PathBuf::from("out/banner.webp")
        );
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let transient = ForgeError::ApiError {
            status: 503,
            message: "overloaded".into(),
        };
        assert_eq!(backoff_delay(1000, 1, &transient), Duration::from_secs(1));
        assert_eq!(backoff_delay(1000, 3, &transient), Duration::from_secs(4));
        assert_eq!(backoff_delay(1000, 90, &transient), MAX_BACKOFF);
        assert_eq!(backoff_delay(u64::MAX, 2, &transient), MAX_BACKOFF);

        let limited = |secs| ForgeError::RateLimitExceeded {
            model: "m".into(),
            retry_after_secs: Some(secs),
        };
        assert_eq!(backoff_delay(10, 1, &limited(7)), Duration::from_secs(7));
        assert_eq!(backoff_delay(10, 1, &limited(u64::MAX / 10)), MAX_BACKOFF);
    }

    #[test]
    fn numbered_paths_keep_extension() {
        assert_eq!(
            numbered_path(Path::new("out/cat.png"), 2),
            PathBuf::from("out/cat_2.png")
        );
    }

    #[test]
    fn default_path_uses_timestamp() {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        assert_eq!(
            default_output_path(now),
            PathBuf::from("output/image_20240309_140507.png")
        );
    }

    /// Fails with the queued errors, then returns one JPEG.
    struct Flaky {
        errors: Mutex<Vec<ForgeError>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ImageProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _request: &ImageRequest) -> Result<ImageResponse, ForgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = self.errors.lock().unwrap().pop() {
                return Err(e);
            }
            Ok(ImageResponse {
                images: vec![
                    InlineImage::new("image/jpeg", b"first".to_vec()),
                    InlineImage::new("image/jpeg", b"second".to_vec()),
                ],
                text: vec!["done".into()],
            })
        }
    }

    fn config_with(provider: Arc<dyn ImageProvider>, retries: u32) -> ImageGenConfig {
        ImageGenConfig::builder()
            .provider(provider)
            .max_retries(retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn retries_transient_errors_then_saves_all_images() {
        let flaky = Arc::new(Flaky {
            errors: Mutex::new(vec![
                ForgeError::ApiError {
                    status: 503,
                    message: "busy".into(),
                },
                ForgeError::Transport("reset".into()),
            ]),
            calls: AtomicU32::new(0),
        });
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("art/pic.png");

        let result = generate_image("a fox", &out, &config_with(flaky.clone(), 2))
            .await
            .unwrap();

        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.text.as_deref(), Some("done"));
        assert_eq!(result.images.len(), 2);
        assert_eq!(result.images[0].path, dir.path().join("art/pic.jpg"));
        assert_eq!(result.images[1].path, dir.path().join("art/pic_2.jpg"));
        assert_eq!(std::fs::read(&result.images[1].path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn non_retryable_error_is_returned_immediately() {
        let flaky = Arc::new(Flaky {
            errors: Mutex::new(vec![ForgeError::AuthError {
                detail: "bad key".into(),
            }]),
            calls: AtomicU32::new(0),
        });
        let dir = tempfile::tempdir().unwrap();
        let err = generate_image("a fox", dir.path().join("x.png"), &config_with(flaky.clone(), 3))
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::AuthError { .. }));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let flaky = Arc::new(Flaky {
            errors: Mutex::new(
                (0..5)
                    .map(|_| ForgeError::ApiTimeout { secs: 1 })
                    .collect(),
            ),
            calls: AtomicU32::new(0),
        });
        let dir = tempfile::tempdir().unwrap();
        let err = generate_image("a fox", dir.path().join("x.png"), &config_with(flaky.clone(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::ApiTimeout { .. }));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    struct TextOnly;

    #[async_trait]
    impl ImageProvider for TextOnly {
        fn name(&self) -> &str {
            "text-only"
        }

        async fn generate(&self, _request: &ImageRequest) -> Result<ImageResponse, ForgeError> {
            Ok(ImageResponse {
                images: vec![],
                text: vec!["I cannot draw that.".into()],
            })
        }
    }

    #[tokio::test]
    async fn text_only_response_is_no_image_generated() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_image(
            "a fox",
            dir.path().join("x.png"),
            &config_with(Arc::new(TextOnly), 0),
        )
        .await
        .unwrap_err();
        match err {
            ForgeError::NoImageGenerated { text } => {
                assert_eq!(text.as_deref(), Some("I cannot draw that."))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!dir.path().join("x.png").exists());
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let err = generate_image("  ", "x.png", &config_with(Arc::new(TextOnly), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidInput { .. }));
    }
}
