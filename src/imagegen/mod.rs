//! Text prompt → image via a generative image API.
//!
//! ```text
//! prompt (+ reference images)
//!  │
//!  ├─ 1. References   read + MIME-sniff, skip unusable ones
//!  ├─ 2. Request      provider.generate() with retry/backoff
//!  ├─ 3. Check        no image → NoImageGenerated (carries model text)
//!  └─ 4. Save         extension from MIME type, atomic write
//! ```

pub mod gemini;
pub mod generate;
pub mod provider;
pub mod reference;

pub use gemini::{resolve_api_key, GeminiClient};
pub use generate::{
    default_output_path, extension_for_mime, generate_image, request_with_retry, resolve_provider,
    save_images, with_mime_extension,
};
pub use provider::{ImageProvider, ImageRequest, ImageResponse, InlineImage};
pub use reference::{load_reference_images, LoadedReference};
