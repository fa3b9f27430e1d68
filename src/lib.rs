//! # docforge
//!
//! Turn prompts, HTML pages and Markdown files into images and PDFs.
//!
//! ## Why this crate?
//!
//! Producing a portfolio banner, a shareable long screenshot of a landing
//! page, a printable Markdown note and a slide deck usually means four tools
//! and four sets of flags. docforge wraps each of them in one async pipeline
//! with the same error type, the same atomic output handling and the same
//! progress hooks, plus a small CLI per pipeline.
//!
//! ## Pipelines
//!
//! ```text
//! prompt ──────────► Gemini image API ──► image (png / jpg / webp)
//! prompt catalogue ► Gemini, one by one ─► output/<category>/<name>.png + report
//! page.html ───────► headless Chromium ─► page_fullpage.png ──► page_fullpage.pdf
//! notes.md ────────► HTML + stylesheet ─► Chromium print ─────► notes.pdf
//! talk.md ─────────► marp CLI ──────────► talk.pdf (+ talk.html)
//! ```
//!
//! | Operation | Config | Output |
//! |-----------|--------|--------|
//! | [`generate_image`] | [`ImageGenConfig`] | [`GenerationOutput`] |
//! | [`run_batch`] | [`BatchConfig`] | [`BatchReport`] |
//! | [`capture_long_image`] / [`capture_to_pdf`] | [`CaptureConfig`] | [`CaptureOutput`] |
//! | [`convert_markdown_to_pdf`] | [`MarkdownPdfConfig`] | [`RenderedDocument`] |
//! | [`render_slides`] | [`SlideConfig`] | [`SlideOutput`] |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docforge::{generate_image, ImageGenConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key read from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let config = ImageGenConfig::builder().aspect_ratio("16:9").build()?;
//!     let out = generate_image("A lighthouse at dusk, flat vector style", "output/lighthouse.png", &config).await?;
//!     for image in &out.images {
//!         println!("{} ({} bytes)", image.path.display(), image.bytes);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! | Needed by | Tool | Located via |
//! |-----------|------|-------------|
//! | capture, Markdown → PDF | Chrome / Chromium / Edge | `CHROME_PATH`, `PATH`, install dirs |
//! | slides | marp CLI | `MARP_CLI_PATH`, `marp` on `PATH`, `npx` |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the binaries (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docforge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod imagegen;
pub mod markdown;
pub mod output;
pub mod progress;
pub mod slides;

#[cfg(feature = "cli")]
pub mod cli;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, CatalogEntry, PromptCatalog};
pub use capture::{capture_long_image, capture_to_pdf, image_to_pdf};
pub use config::{
    BatchConfig, BatchConfigBuilder, BrowserOptions, CaptureConfig, CaptureConfigBuilder,
    ImageGenConfig, ImageGenConfigBuilder, ImageModel, MarkdownPdfConfig, MarkdownPdfConfigBuilder,
    MarpTheme, SlideConfig, SlideConfigBuilder,
};
pub use error::{ForgeError, ItemError};
pub use imagegen::{
    generate_image, GeminiClient, ImageProvider, ImageRequest, ImageResponse, InlineImage,
    LoadedReference,
};
pub use markdown::convert_markdown_to_pdf;
pub use output::{
    BatchReport, CaptureOutput, GeneratedImage, GenerationOutput, ItemOutcome, ItemStatus,
    RenderedDocument, SlideOutput,
};
pub use progress::{
    BatchProgress, BatchProgressCallback, NoopProgressCallback, Stage, StageCallback, StageProgress,
};
pub use slides::render_slides;
