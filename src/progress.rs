//! Progress callbacks for batch generation and single-document pipelines.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! per-prompt events, or an [`Arc<dyn StageCallback>`] on the capture,
//! Markdown and slide configs to follow their coarse stages.
//!
//! # Example
//!
//! ```rust
//! use docforge::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_item_complete(&self, index: usize, total: usize, name: &str, _bytes: usize) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{name}: {index}/{total} ({done} done)");
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Called by the batch generator as it works through the catalogue.
///
/// Items are processed sequentially. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first item.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the API request for an item.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `total`: number of items in the batch
    /// * `name` : item name (also its file stem)
    fn on_item_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when an item's image has been written.
    ///
    /// `bytes` is the size of the saved file.
    fn on_item_complete(&self, index: usize, total: usize, name: &str, bytes: usize) {
        let _ = (index, total, name, bytes);
    }

    /// Called when an item fails after all retries.
    fn on_item_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every item has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

impl StageCallback for NoopProgressCallback {}

/// Alias for the type stored in [`crate::config::BatchConfig`].
pub type BatchProgress = Arc<dyn BatchProgressCallback>;

// ── Stages ───────────────────────────────────────────────────────────────

/// Coarse steps of the browser and marp pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LaunchBrowser,
    LoadPage,
    RevealContent,
    ScrollPage,
    Screenshot,
    EncodePdf,
    RenderHtml,
    PrintPdf,
    RunMarp,
    WriteOutput,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::LaunchBrowser => "Launching browser",
            Stage::LoadPage => "Loading page",
            Stage::RevealContent => "Revealing hidden content",
            Stage::ScrollPage => "Scrolling to trigger lazy content",
            Stage::Screenshot => "Capturing screenshot",
            Stage::EncodePdf => "Building PDF",
            Stage::RenderHtml => "Rendering Markdown",
            Stage::PrintPdf => "Printing PDF",
            Stage::RunMarp => "Running marp",
            Stage::WriteOutput => "Writing output",
        };
        f.write_str(s)
    }
}

/// Receives stage transitions from the single-document pipelines.
pub trait StageCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }
}

/// Alias for the type stored in the capture, Markdown and slide configs.
pub type StageProgress = Arc<dyn StageCallback>;

/// Forwards `stage` to the callback if one is configured, and logs it.
pub(crate) fn report_stage(cb: &Option<StageProgress>, stage: Stage) {
    tracing::debug!(%stage, "stage");
    if let Some(cb) = cb {
        cb.on_stage(stage);
    }
}
