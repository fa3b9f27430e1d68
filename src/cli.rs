//! Shared plumbing for the docforge binaries: logging setup, colour
//! helpers and indicatif-backed progress callbacks.

use crate::progress::{BatchProgressCallback, Stage, StageCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

pub fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
pub fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
pub fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
pub fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
pub fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Setup ────────────────────────────────────────────────────────────────────

/// Loads `.env` from the working directory if present. Call before parsing
/// arguments so `#[arg(env = ...)]` sees the values.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("loaded {}", path.display());
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the flags.
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .try_init();
}

// ── Status lines ─────────────────────────────────────────────────────────────

/// Bold title followed by a rule.
pub fn banner(title: &str) {
    eprintln!("{}", bold(title));
    eprintln!("{}", dim(&"─".repeat(title.chars().count().max(40))));
}

/// `label: value` with the label padded and dimmed.
pub fn field(label: &str, value: impl std::fmt::Display) {
    eprintln!("{} {value}", dim(&format!("{label:<12}")));
}

/// Hint for opening `path` with the platform's default viewer.
pub fn open_hint(path: &Path) -> String {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "start"
    } else {
        "xdg-open"
    };
    format!("{} {opener} \"{}\"", dim("→"), path.display())
}

// ── Spinners ────────────────────────────────────────────────────────────

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&TICKS)
}

/// Plain spinner for a single long-running call.
pub fn spinner(prefix: &str, msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(spinner_style());
    bar.set_prefix(prefix.to_string());
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Spinner that prints one line per pipeline stage.
pub struct StageSpinner {
    bar: ProgressBar,
    current: Mutex<Option<(Stage, Instant)>>,
}

impl StageSpinner {
    pub fn new(prefix: &str) -> Arc<Self> {
        let bar = spinner(prefix, "starting…");
        Arc::new(Self {
            bar,
            current: Mutex::new(None),
        })
    }

    fn close_current(&self) {
        let previous = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some((stage, started)) = previous {
            self.bar.println(format!(
                "  {} {stage}  {}",
                green("✓"),
                dim(&format!("{:.1}s", started.elapsed().as_secs_f64()))
            ));
        }
    }

    /// Marks the last stage done and removes the spinner.
    pub fn finish(&self) {
        self.close_current();
        self.bar.finish_and_clear();
    }

    /// Removes the spinner, reporting the running stage as failed.
    pub fn fail(&self) {
        let previous = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some((stage, _)) = previous {
            self.bar.println(format!("  {} {stage}", red("✗")));
        }
        self.bar.finish_and_clear();
    }
}

impl StageCallback for StageSpinner {
    fn on_stage(&self, stage: Stage) {
        self.close_current();
        if let Ok(mut c) = self.current.lock() {
            *c = Some((stage, Instant::now()));
        }
        self.bar.set_message(format!("{stage}…"));
    }
}

// ── Batch progress bar ───────────────────────────────────────────────────────

/// Progress bar for batch generation with one log line per item.
pub struct BatchProgressBar {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl BatchProgressBar {
    pub fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} images  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&TICKS),
        );
        bar.set_prefix("Generating");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl BatchProgressCallback for BatchProgressBar {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating {total} image(s)…"))
        ));
    }

    fn on_item_start(&self, index: usize, _total: usize, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_item_complete(&self, index: usize, total: usize, name: &str, bytes: usize) {
        let secs = self.elapsed(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<28} {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&crate::output::format_kb(bytes)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed(index);
        self.errors.fetch_add(1, Ordering::SeqCst);
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<28} {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&crate::output::preview(first_line, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}
