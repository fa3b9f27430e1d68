//! Error types for the docforge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ForgeError`] (**fatal**): the pipeline cannot produce its output
//!   (missing input file, no API key, browser not installed, marp exited
//!   non-zero). Returned as `Err(ForgeError)` from every top-level operation.
//!
//! * [`ItemError`] (**non-fatal**): one prompt of a batch failed but the rest
//!   of the batch carries on. Stored inside
//!   [`crate::output::ItemOutcome`] so callers can report partial success.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docforge library.
#[derive(Debug, Error)]
pub enum ForgeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is syntactically unusable (bad aspect ratio, unsafe name…).
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The input file is not valid UTF-8 text.
    #[error("'{path}' is not valid UTF-8 text: {detail}")]
    NotUtf8 { path: PathBuf, detail: String },

    // ── Image API errors ──────────────────────────────────────────────────
    /// Neither `GEMINI_API_KEY` nor `GOOGLE_API_KEY` is set.
    #[error(
        "GEMINI_API_KEY or GOOGLE_API_KEY environment variable not set.\n\
Get your API key from: https://aistudio.google.com/app/apikey"
    )]
    MissingApiKey,

    /// The API rejected the key (401/403 or an API_KEY error message).
    #[error("API key issue. Check your GEMINI_API_KEY.\nDetails: {detail}")]
    AuthError { detail: String },

    /// The request or its output was blocked by safety filters.
    #[error("Content blocked by safety filters. Try modifying your prompt.\nDetails: {detail}")]
    ContentBlocked { detail: String },

    /// HTTP 429: caller should back off.
    #[error("Rate limit exceeded for model '{model}'")]
    RateLimitExceeded {
        model: String,
        retry_after_secs: Option<u64>,
    },

    /// The API call did not complete in time.
    #[error("API call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// Any other non-success API answer.
    #[error("Image API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Transport-level failure (DNS, connection reset, TLS).
    #[error("Request to the image API failed: {0}")]
    Transport(String),

    /// The model answered with text only.
    #[error("No image was generated. The model may have returned only text.{}", text_suffix(.text))]
    NoImageGenerated { text: Option<String> },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Prompt catalogue could not be read or parsed.
    #[error("Error loading prompt catalogue '{source_name}': {detail}")]
    CatalogLoad { source_name: String, detail: String },

    /// `--single` named a key that is not in the catalogue.
    #[error("'{key}' not found in prompts\nAvailable: {}", .available.join(", "))]
    UnknownPrompt { key: String, available: Vec<String> },

    // ── Browser errors ────────────────────────────────────────────────────
    /// Browser could not be started.
    #[error("Failed to launch headless browser: {0}")]
    BrowserLaunch(String),

    /// A DevTools command failed after launch.
    #[error("Browser step '{step}' failed: {detail}")]
    Browser { step: &'static str, detail: String },

    // ── Image / PDF encoding errors ───────────────────────────────────────
    /// The screenshot or reference image could not be decoded.
    #[error("Could not decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// PDF assembly failed.
    #[error("PDF generation failed: {0}")]
    PdfEncode(String),

    // ── External tool errors ──────────────────────────────────────────────
    /// A required external program is not installed.
    #[error("{0}")]
    ToolNotFound(#[from] tool_locate::ToolLocateError),

    /// The external program exited unsuccessfully.
    #[error("{tool} failed (exit status {status}).\nError output: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The external program exceeded its time limit and was killed.
    #[error("{tool} timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn text_suffix(text: &Option<String>) -> String {
    match text {
        Some(t) if !t.trim().is_empty() => format!("\nModel response: {}", t.trim()),
        _ => String::new(),
    }
}

impl ForgeError {
    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Rate limits, timeouts, transport failures and 5xx answers are
    /// transient. Auth problems, safety blocks and 4xx answers are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ForgeError::RateLimitExceeded { .. }
            | ForgeError::ApiTimeout { .. }
            | ForgeError::Transport(_) => true,
            ForgeError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Map an I/O error on an input path to the matching variant.
    pub(crate) fn from_input_io(path: &std::path::Path, e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => ForgeError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ForgeError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ForgeError::Internal(format!("reading {}: {e}", path.display())),
        }
    }
}

/// A non-fatal error for a single batch item.
///
/// Stored alongside [`crate::output::ItemOutcome`] when an item fails.
/// The batch continues with the next prompt.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The image API call failed after retries.
    #[error("{name}: generation failed after {retries} retries: {detail}")]
    GenerationFailed {
        name: String,
        retries: u32,
        detail: String,
    },

    /// The image was generated but could not be written.
    #[error("{name}: could not save image: {detail}")]
    SaveFailed { name: String, detail: String },
}
