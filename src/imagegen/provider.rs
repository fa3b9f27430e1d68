//! The image-provider seam: request/response types and the async trait.
//!
//! [`generate_image`](crate::generate_image) and [`run_batch`](crate::run_batch)
//! only talk to `dyn ImageProvider`, so tests (and callers with their own
//! backends) can inject a provider through
//! [`ImageGenConfigBuilder::provider`](crate::config::ImageGenConfigBuilder::provider).

use crate::config::ImageModel;
use crate::error::ForgeError;
use async_trait::async_trait;

/// Raw image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// One generation request.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub model: ImageModel,
    pub prompt: String,
    /// Sent ahead of the prompt, in order.
    pub references: Vec<InlineImage>,
    pub aspect_ratio: Option<String>,
}

impl ImageRequest {
    pub fn new(model: ImageModel, prompt: impl Into<String>) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            references: Vec::new(),
            aspect_ratio: None,
        }
    }
}

/// What the model returned: zero or more images plus any text parts.
#[derive(Debug, Clone, Default)]
pub struct ImageResponse {
    pub images: Vec<InlineImage>,
    pub text: Vec<String>,
}

impl ImageResponse {
    /// Text parts joined with single spaces, or None when there were none.
    pub fn joined_text(&self) -> Option<String> {
        let joined = self
            .text
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }
}

/// A backend that turns a prompt (plus reference images) into images.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Perform a single request. Retries are the caller's business.
    async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse, ForgeError>;
}
