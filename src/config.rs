//! Configuration types for every docforge pipeline.
//!
//! Each pipeline is driven by one struct with documented defaults and a
//! builder whose `build()` validates constraints:
//!
//! | Pipeline | Config |
//! |----------|--------|
//! | prompt → image | [`ImageGenConfig`] |
//! | prompt catalogue → images | [`BatchConfig`] |
//! | HTML → long screenshot | [`CaptureConfig`] |
//! | Markdown → PDF | [`MarkdownPdfConfig`] |
//! | Markdown → slides | [`SlideConfig`] |
//!
//! Browser-backed pipelines share [`BrowserOptions`].

use crate::capture::pdf::DEFAULT_DPI;
use crate::error::ForgeError;
use crate::imagegen::ImageProvider;
use crate::progress::{BatchProgress, StageProgress};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default Gemini REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Upper bound for [`ImageGenConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

// ── Image models ─────────────────────────────────────────────────────────

/// Gemini image models accepted by the generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageModel {
    /// `gemini-2.5-flash-image`: fast, square output. Default for single images.
    #[default]
    Flash,
    /// `gemini-2.5-flash-image-preview`.
    FlashPreview,
    /// `gemini-3-pro-image-preview`: better text rendering, 16:9 output.
    Pro,
}

impl ImageModel {
    /// Every model, in the order shown by `--help`.
    pub const ALL: [ImageModel; 3] = [ImageModel::Flash, ImageModel::FlashPreview, ImageModel::Pro];

    /// The API model id.
    pub fn id(&self) -> &'static str {
        match self {
            ImageModel::Flash => "gemini-2.5-flash-image",
            ImageModel::FlashPreview => "gemini-2.5-flash-image-preview",
            ImageModel::Pro => "gemini-3-pro-image-preview",
        }
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ImageModel {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageModel::ALL
            .into_iter()
            .find(|m| m.id() == s.trim())
            .ok_or_else(|| ForgeError::InvalidInput {
                input: s.to_string(),
                reason: format!(
                    "unknown model; choose one of {}",
                    ImageModel::ALL.map(|m| m.id()).join(", ")
                ),
            })
    }
}

// ── Image generation ─────────────────────────────────────────────────────

static RE_ASPECT_RATIO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}:\d{1,2}$").unwrap());

/// Configuration for a single prompt → image call.
///
/// # Example
/// ```rust
/// use docforge::{ImageGenConfig, ImageModel};
///
/// let config = ImageGenConfig::builder()
///     .model(ImageModel::Pro)
///     .aspect_ratio("16:9")
///     .max_retries(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ImageGenConfig {
    /// Model to call. Default: [`ImageModel::Flash`].
    pub model: ImageModel,

    /// API key. If None, read from `GEMINI_API_KEY` then `GOOGLE_API_KEY`.
    pub api_key: Option<String>,

    /// REST endpoint base. Default: [`DEFAULT_API_BASE`].
    pub api_base: String,

    /// Requested aspect ratio such as `16:9`. Default: None (model default).
    pub aspect_ratio: Option<String>,

    /// Reference images sent ahead of the prompt, in order.
    pub references: Vec<PathBuf>,

    /// Extra attempts after a transient failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds. Default: 120.
    ///
    /// Image synthesis regularly takes 10–40 s; the pro model can take longer.
    pub request_timeout_secs: u64,

    /// Pre-constructed provider. Takes precedence over the Gemini client.
    pub provider: Option<Arc<dyn ImageProvider>>,
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            model: ImageModel::default(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            aspect_ratio: None,
            references: Vec::new(),
            max_retries: 2,
            retry_backoff_ms: 1000,
            request_timeout_secs: 120,
            provider: None,
        }
    }
}

impl fmt::Debug for ImageGenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageGenConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("aspect_ratio", &self.aspect_ratio)
            .field("references", &self.references)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

impl ImageGenConfig {
    /// Create a new builder for `ImageGenConfig`.
    pub fn builder() -> ImageGenConfigBuilder {
        ImageGenConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ImageGenConfig`].
#[derive(Debug)]
pub struct ImageGenConfigBuilder {
    config: ImageGenConfig,
}

impl ImageGenConfigBuilder {
    pub fn model(mut self, model: ImageModel) -> Self {
        self.config.model = model;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.config.aspect_ratio = Some(ratio.into());
        self
    }

    pub fn reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.references.push(path.into());
        self
    }

    pub fn references(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.config.references.extend(paths);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ImageGenConfig, ForgeError> {
        let c = &self.config;
        if let Some(ref ratio) = c.aspect_ratio {
            if !RE_ASPECT_RATIO.is_match(ratio.trim()) {
                return Err(ForgeError::InvalidConfig(format!(
                    "aspect ratio must look like '16:9', got '{ratio}'"
                )));
            }
        }
        if c.api_base.trim().is_empty() {
            return Err(ForgeError::InvalidConfig("API base URL is empty".into()));
        }
        if c.max_retries > MAX_RETRIES {
            return Err(ForgeError::InvalidConfig(format!(
                "max_retries must be at most {MAX_RETRIES}, got {}",
                c.max_retries
            )));
        }
        Ok(self.config)
    }
}

// ── Batch generation ─────────────────────────────────────────────────────

/// Configuration for generating a whole prompt catalogue.
#[derive(Clone)]
pub struct BatchConfig {
    /// Per-image settings. The default model is [`ImageModel::Pro`].
    pub image: ImageGenConfig,

    /// Pause between consecutive API calls. Default: 2 s.
    ///
    /// Not applied after the last item.
    pub delay: Duration,

    /// Receives per-item events.
    pub progress_callback: Option<BatchProgress>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            image: ImageGenConfig {
                model: ImageModel::Pro,
                ..ImageGenConfig::default()
            },
            delay: Duration::from_secs(2),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("image", &self.image)
            .field("delay", &self.delay)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn image(mut self, image: ImageGenConfig) -> Self {
        self.config.image = image;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Delay in (fractional) seconds, as accepted on the command line.
    pub fn delay_secs(mut self, secs: f64) -> Self {
        let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        self.config.delay = Duration::from_secs_f64(secs);
        self
    }

    pub fn progress_callback(mut self, cb: BatchProgress) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn build(self) -> Result<BatchConfig, ForgeError> {
        if !self.config.image.references.is_empty() {
            return Err(ForgeError::InvalidConfig(
                "reference images are not supported for batch generation".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Browser ──────────────────────────────────────────────────────────────

/// Headless browser settings shared by capture and Markdown printing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserOptions {
    /// Explicit browser executable. If None, located via `tool-locate`.
    pub chrome_path: Option<PathBuf>,

    /// Pass `--no-sandbox` (needed in most containers). Default: false.
    pub no_sandbox: bool,

    /// Viewport width in CSS pixels. Default: 1200.
    pub viewport_width: u32,

    /// Viewport height in CSS pixels. Default: 800.
    pub viewport_height: u32,

    /// DevTools request timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            no_sandbox: false,
            viewport_width: 1200,
            viewport_height: 800,
            request_timeout_secs: 60,
        }
    }
}

// ── HTML capture ─────────────────────────────────────────────────────────

/// Configuration for HTML → long screenshot.
#[derive(Clone)]
pub struct CaptureConfig {
    pub browser: BrowserOptions,

    /// Distance between lazy-load scroll stops, in pixels. Default: 1000.
    pub scroll_step: u32,

    /// Pause at every scroll stop. Default: 100 ms.
    pub scroll_pause: Duration,

    /// Pause after returning to the top, before capturing. Default: 500 ms.
    pub settle: Duration,

    /// CSS selector list forced visible before capture. Default: `.section, .cover`.
    ///
    /// Scroll-reveal pages keep these at `opacity: 0` until an observer fires,
    /// which never happens for content a full-page capture never scrolls to.
    pub reveal_selectors: String,

    /// Resolution of the PDF made by `capture_to_pdf`, in pixels per inch. Default: 100.
    pub pdf_dpi: f32,

    /// Receives coarse stage events.
    pub stage_callback: Option<StageProgress>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            browser: BrowserOptions::default(),
            scroll_step: 1000,
            scroll_pause: Duration::from_millis(100),
            settle: Duration::from_millis(500),
            reveal_selectors: ".section, .cover".to_string(),
            pdf_dpi: DEFAULT_DPI,
            stage_callback: None,
        }
    }
}

impl fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("browser", &self.browser)
            .field("scroll_step", &self.scroll_step)
            .field("scroll_pause", &self.scroll_pause)
            .field("settle", &self.settle)
            .field("reveal_selectors", &self.reveal_selectors)
            .field("pdf_dpi", &self.pdf_dpi)
            .finish()
    }
}

impl CaptureConfig {
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CaptureConfig`].
#[derive(Debug)]
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl CaptureConfigBuilder {
    pub fn browser(mut self, browser: BrowserOptions) -> Self {
        self.config.browser = browser;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.browser.viewport_width = width;
        self.config.browser.viewport_height = height;
        self
    }

    pub fn scroll_step(mut self, px: u32) -> Self {
        self.config.scroll_step = px;
        self
    }

    pub fn scroll_pause(mut self, d: Duration) -> Self {
        self.config.scroll_pause = d;
        self
    }

    pub fn settle(mut self, d: Duration) -> Self {
        self.config.settle = d;
        self
    }

    pub fn reveal_selectors(mut self, selectors: impl Into<String>) -> Self {
        self.config.reveal_selectors = selectors.into();
        self
    }

    pub fn pdf_dpi(mut self, dpi: f32) -> Self {
        self.config.pdf_dpi = dpi;
        self
    }

    pub fn stage_callback(mut self, cb: StageProgress) -> Self {
        self.config.stage_callback = Some(cb);
        self
    }

    pub fn build(self) -> Result<CaptureConfig, ForgeError> {
        let c = &self.config;
        if c.scroll_step < 100 {
            return Err(ForgeError::InvalidConfig(format!(
                "scroll step must be ≥ 100 px, got {}",
                c.scroll_step
            )));
        }
        if c.browser.viewport_width < 200 || c.browser.viewport_height < 200 {
            return Err(ForgeError::InvalidConfig(format!(
                "viewport must be at least 200×200, got {}×{}",
                c.browser.viewport_width, c.browser.viewport_height
            )));
        }
        if c.reveal_selectors.contains(['{', '}']) {
            return Err(ForgeError::InvalidConfig(
                "reveal selectors must not contain braces".into(),
            ));
        }
        if !(c.pdf_dpi.is_finite() && c.pdf_dpi > 0.0) {
            return Err(ForgeError::InvalidConfig(format!(
                "dpi must be positive, got {}",
                c.pdf_dpi
            )));
        }
        Ok(self.config)
    }
}

// ── Markdown → PDF ───────────────────────────────────────────────────────

/// Configuration for Markdown → styled PDF.
#[derive(Clone)]
pub struct MarkdownPdfConfig {
    pub browser: BrowserOptions,

    /// Guess the language of fenced code blocks without an info string. Default: true.
    pub guess_lang: bool,

    /// Stylesheet appended after the built-in one.
    pub extra_css: Option<String>,

    /// Also write the intermediate HTML next to the PDF. Default: false.
    pub keep_html: bool,

    /// Receives coarse stage events.
    pub stage_callback: Option<StageProgress>,
}

impl Default for MarkdownPdfConfig {
    fn default() -> Self {
        Self {
            browser: BrowserOptions::default(),
            guess_lang: true,
            extra_css: None,
            keep_html: false,
            stage_callback: None,
        }
    }
}

impl fmt::Debug for MarkdownPdfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkdownPdfConfig")
            .field("browser", &self.browser)
            .field("guess_lang", &self.guess_lang)
            .field("extra_css", &self.extra_css.as_ref().map(|c| c.len()))
            .field("keep_html", &self.keep_html)
            .finish()
    }
}

impl MarkdownPdfConfig {
    pub fn builder() -> MarkdownPdfConfigBuilder {
        MarkdownPdfConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`MarkdownPdfConfig`].
#[derive(Debug)]
pub struct MarkdownPdfConfigBuilder {
    config: MarkdownPdfConfig,
}

impl MarkdownPdfConfigBuilder {
    pub fn browser(mut self, browser: BrowserOptions) -> Self {
        self.config.browser = browser;
        self
    }

    pub fn guess_lang(mut self, on: bool) -> Self {
        self.config.guess_lang = on;
        self
    }

    pub fn extra_css(mut self, css: impl Into<String>) -> Self {
        self.config.extra_css = Some(css.into());
        self
    }

    pub fn keep_html(mut self, on: bool) -> Self {
        self.config.keep_html = on;
        self
    }

    pub fn stage_callback(mut self, cb: StageProgress) -> Self {
        self.config.stage_callback = Some(cb);
        self
    }

    pub fn build(self) -> Result<MarkdownPdfConfig, ForgeError> {
        let c = &self.config;
        if let Some(ref css) = c.extra_css {
            if css.trim().is_empty() {
                return Err(ForgeError::InvalidConfig("extra stylesheet is empty".into()));
            }
            // Inlined into a <style> element.
            if css.to_ascii_lowercase().contains("</style") {
                return Err(ForgeError::InvalidConfig(
                    "extra stylesheet must not close the <style> element".into(),
                ));
            }
        }
        if c.browser.request_timeout_secs == 0 {
            return Err(ForgeError::InvalidConfig(
                "browser request timeout must be at least 1 s".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Slides ───────────────────────────────────────────────────────────────

/// Built-in marp themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarpTheme {
    #[default]
    Default,
    Gaia,
    Uncover,
}

impl MarpTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarpTheme::Default => "default",
            MarpTheme::Gaia => "gaia",
            MarpTheme::Uncover => "uncover",
        }
    }
}

impl FromStr for MarpTheme {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(MarpTheme::Default),
            "gaia" => Ok(MarpTheme::Gaia),
            "uncover" => Ok(MarpTheme::Uncover),
            other => Err(ForgeError::InvalidInput {
                input: other.to_string(),
                reason: "unknown theme; choose default, gaia or uncover".into(),
            }),
        }
    }
}

impl fmt::Display for MarpTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for Markdown → slide deck.
#[derive(Clone)]
pub struct SlideConfig {
    /// Default: [`MarpTheme::Default`].
    pub theme: MarpTheme,

    /// Explicit marp executable. If None, located via `tool-locate`.
    pub marp_path: Option<PathBuf>,

    /// Also render an HTML deck next to the PDF. Default: false.
    pub html_output: bool,

    /// Prepend marp front-matter to the input when missing. Default: false.
    ///
    /// This edits the input file in place.
    pub add_frontmatter: bool,

    /// Time limit for each marp run, in seconds. Default: 60.
    pub timeout_secs: u64,

    /// Time limit for the `npx` availability probe, in seconds. Default: 10.
    pub probe_timeout_secs: u64,

    /// Receives coarse stage events.
    pub stage_callback: Option<StageProgress>,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            theme: MarpTheme::default(),
            marp_path: None,
            html_output: false,
            add_frontmatter: false,
            timeout_secs: 60,
            probe_timeout_secs: 10,
            stage_callback: None,
        }
    }
}

impl fmt::Debug for SlideConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlideConfig")
            .field("theme", &self.theme)
            .field("marp_path", &self.marp_path)
            .field("html_output", &self.html_output)
            .field("add_frontmatter", &self.add_frontmatter)
            .field("timeout_secs", &self.timeout_secs)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .finish()
    }
}

impl SlideConfig {
    pub fn builder() -> SlideConfigBuilder {
        SlideConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SlideConfig`].
#[derive(Debug)]
pub struct SlideConfigBuilder {
    config: SlideConfig,
}

impl SlideConfigBuilder {
    pub fn theme(mut self, theme: MarpTheme) -> Self {
        self.config.theme = theme;
        self
    }

    pub fn marp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.marp_path = Some(path.into());
        self
    }

    pub fn html_output(mut self, on: bool) -> Self {
        self.config.html_output = on;
        self
    }

    pub fn add_frontmatter(mut self, on: bool) -> Self {
        self.config.add_frontmatter = on;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    pub fn stage_callback(mut self, cb: StageProgress) -> Self {
        self.config.stage_callback = Some(cb);
        self
    }

    pub fn build(self) -> Result<SlideConfig, ForgeError> {
        let c = &self.config;
        if c.timeout_secs == 0 {
            return Err(ForgeError::InvalidConfig("marp timeout must be at least 1 s".into()));
        }
        if c.probe_timeout_secs == 0 {
            return Err(ForgeError::InvalidConfig("npx probe timeout must be at least 1 s".into()));
        }
        if c.marp_path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(ForgeError::InvalidConfig("marp path is empty".into()));
        }
        Ok(self.config)
    }
}
