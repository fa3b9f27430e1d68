//! Result types returned by the pipelines, plus the shared file writer.

use crate::error::{ForgeError, ItemError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Image generation ─────────────────────────────────────────────────────

/// One image returned by [`crate::generate_image`] and written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Final path, after the extension was aligned with the MIME type.
    pub path: PathBuf,
    /// MIME type reported by the API, e.g. `image/png`.
    pub mime_type: String,
    /// Size of the written file.
    pub bytes: usize,
}

/// Everything a single generation call produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Saved images, primary first.
    pub images: Vec<GeneratedImage>,
    /// Text the model returned alongside the images, if any.
    pub text: Option<String>,
    /// Model id that produced the images.
    pub model: String,
    /// Reference images actually sent, in order. Skipped ones are absent.
    #[serde(default)]
    pub references: Vec<PathBuf>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

impl GenerationOutput {
    /// The first saved image.
    pub fn primary(&self) -> Option<&GeneratedImage> {
        self.images.first()
    }
}

// ── Batch ────────────────────────────────────────────────────────────────

/// Whether a batch item produced an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Failed,
}

/// Outcome of a single catalogue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Catalogue key.
    pub key: String,
    /// File stem.
    pub name: String,
    pub category: String,
    pub status: ItemStatus,
    /// Set on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
    pub duration_ms: u64,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

/// Summary of a batch run, serialisable as the `--report` JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub images: Vec<ItemOutcome>,
    pub duration_ms: u64,
}

impl BatchReport {
    /// Builds the report and derives the counters from `images`.
    pub fn from_outcomes(images: Vec<ItemOutcome>, duration_ms: u64) -> Self {
        let success = images.iter().filter(|o| o.is_success()).count();
        Self {
            total: images.len(),
            success,
            failed: images.len() - success,
            images,
            duration_ms,
        }
    }

    /// True when every item produced an image.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Writes the report as pretty JSON.
    pub async fn write_json(&self, path: &Path) -> Result<(), ForgeError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ForgeError::Internal(format!("serialising report: {e}")))?;
        write_output(path, &json).await
    }
}

// ── Documents ────────────────────────────────────────────────────────────

/// Files written by [`crate::capture_long_image`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutput {
    pub image_path: PathBuf,
    pub image_bytes: usize,
    /// Full document height in CSS pixels.
    pub page_height: u32,
    /// Scroll positions visited before the capture.
    pub scroll_stops: usize,
    /// Set when the PDF step ran.
    pub pdf_path: Option<PathBuf>,
    pub pdf_bytes: Option<usize>,
}

/// Files written by [`crate::convert_markdown_to_pdf`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub pdf_path: PathBuf,
    pub pdf_bytes: usize,
    /// Set when the intermediate HTML was kept.
    pub html_path: Option<PathBuf>,
    /// Document title (the input file stem).
    pub title: String,
}

/// Files written by [`crate::render_slides`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideOutput {
    pub pdf_path: PathBuf,
    pub pdf_bytes: usize,
    /// Set when HTML output was requested and its render succeeded.
    pub html_path: Option<PathBuf>,
    pub html_bytes: Option<usize>,
    /// True when front-matter was prepended to the input.
    pub frontmatter_added: bool,
}

// ── File helpers ─────────────────────────────────────────────────────────

/// Writes `bytes` to `path` atomically (temp file + rename), creating
/// parent directories first.
pub async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ForgeError> {
    let fail = |e: std::io::Error| ForgeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Size of a file in bytes, or 0 if it cannot be read.
pub fn file_size(path: &Path) -> usize {
    std::fs::metadata(path).map(|m| m.len() as usize).unwrap_or(0)
}

/// Human-readable size, e.g. `"12.3 KB"`.
pub fn format_kb(bytes: usize) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

/// The first `max_chars` characters of `s`, with `...` appended when cut.
pub fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
