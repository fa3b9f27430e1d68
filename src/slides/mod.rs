//! Markdown → slide deck (PDF, optionally HTML) through the marp CLI.
//!
//! The deck layout is entirely marp's job; this module finds the CLI,
//! optionally prepends the front-matter marp needs, runs it under a time
//! limit and reports what it wrote.

use crate::config::{MarpTheme, SlideConfig};
use crate::error::ForgeError;
use crate::output::{file_size, write_output, SlideOutput};
use crate::progress::{report_stage, Stage};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tool_locate::MarpRunner;
use tracing::{debug, info, warn};

/// Output format of one marp run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    Pdf,
    Html,
}

/// Whether `content` already carries marp front-matter.
///
/// True when the file opens with `---\nmarp:` or `marp: true` appears in
/// the first 100 characters.
pub fn has_marp_frontmatter(content: &str) -> bool {
    if content.starts_with("---\nmarp:") || content.starts_with("---\r\nmarp:") {
        return true;
    }
    let head: String = content.chars().take(100).collect();
    head.contains("marp: true")
}

/// Front-matter block prepended by [`ensure_frontmatter`].
pub fn frontmatter(theme: MarpTheme) -> String {
    format!("---\nmarp: true\ntheme: {theme}\npaginate: true\n---\n\n")
}

/// Prepends marp front-matter to the file at `path` unless present.
///
/// Returns true when the file was changed.
pub async fn ensure_frontmatter(path: &Path, theme: MarpTheme) -> Result<bool, ForgeError> {
    let content = read_utf8(path).await?;
    if has_marp_frontmatter(&content) {
        return Ok(false);
    }
    let updated = format!("{}{content}", frontmatter(theme));
    write_output(path, updated.as_bytes()).await?;
    info!("Added marp front-matter to {}", path.display());
    Ok(true)
}

/// Arguments passed to marp after any runner prefix.
pub fn marp_args(input: &Path, output: &Path, theme: MarpTheme, format: SlideFormat) -> Vec<OsString> {
    let mut args = vec![input.as_os_str().to_os_string()];
    if format == SlideFormat::Pdf {
        args.push("--pdf".into());
    }
    args.extend([
        OsString::from("--allow-local-files"),
        OsString::from("--theme"),
        OsString::from(theme.as_str()),
        OsString::from("-o"),
        output.as_os_str().to_os_string(),
    ]);
    args
}

/// The input path with a `.pdf` extension.
pub fn default_slides_path(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

/// Renders the Markdown file at `input` into a slide-deck PDF.
///
/// With `html_output` set, a second run writes `<output>.html`; a failure of
/// that run is logged and otherwise ignored.
pub async fn render_slides(
    input: impl AsRef<Path>,
    output: Option<&Path>,
    config: &SlideConfig,
) -> Result<SlideOutput, ForgeError> {
    let input = input.as_ref();
    tokio::fs::metadata(input)
        .await
        .map_err(|e| ForgeError::from_input_io(input, e))?;

    let frontmatter_added = if config.add_frontmatter {
        ensure_frontmatter(input, config.theme).await?
    } else {
        false
    };

    let runner = resolve_runner(config).await?;
    let pdf_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_slides_path(input));
    let limit = Duration::from_secs(config.timeout_secs.max(1));

    report_stage(&config.stage_callback, Stage::RunMarp);
    info!(
        "Rendering {} → {} with {} (theme {})",
        input.display(),
        pdf_path.display(),
        runner.label(),
        config.theme
    );
    run_marp(
        &runner,
        marp_args(input, &pdf_path, config.theme, SlideFormat::Pdf),
        limit,
    )
    .await?;

    let pdf_bytes = file_size(&pdf_path);
    if pdf_bytes == 0 {
        return Err(ForgeError::ToolFailed {
            tool: runner.label().to_string(),
            status: "0".into(),
            stderr: format!("no output was written to {}", pdf_path.display()),
        });
    }

    let (html_path, html_bytes) = if config.html_output {
        let html_path = pdf_path.with_extension("html");
        let args = marp_args(input, &html_path, config.theme, SlideFormat::Html);
        match run_marp(&runner, args, limit).await {
            Ok(()) if html_path.exists() => {
                let n = file_size(&html_path);
                (Some(html_path), Some(n))
            }
            Ok(()) => {
                warn!("marp reported success but {} is missing", html_path.display());
                (None, None)
            }
            Err(e) => {
                warn!("HTML deck not generated: {e}");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    Ok(SlideOutput {
        pdf_path,
        pdf_bytes,
        html_path,
        html_bytes,
        frontmatter_added,
    })
}

async fn resolve_runner(config: &SlideConfig) -> Result<MarpRunner, ForgeError> {
    if let Some(p) = &config.marp_path {
        return Ok(MarpRunner::Direct(p.clone()));
    }
    let probe = Duration::from_secs(config.probe_timeout_secs);
    // The npx probe spawns and waits on a child process.
    let found = tokio::task::spawn_blocking(move || tool_locate::locate_marp(probe))
        .await
        .map_err(|e| ForgeError::Internal(format!("marp lookup panicked: {e}")))??;
    Ok(found)
}

/// Runs marp once; non-zero exit and timeouts are errors.
async fn run_marp(runner: &MarpRunner, args: Vec<OsString>, limit: Duration) -> Result<(), ForgeError> {
    let tool = runner.label().to_string();
    debug!(program = %runner.program().display(), ?args, "spawning marp");

    let mut cmd = tokio::process::Command::new(runner.program());
    cmd.args(runner.prefix_args())
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(limit, cmd.output()).await {
        Err(_) => {
            return Err(ForgeError::ToolTimeout {
                tool,
                secs: limit.as_secs(),
            })
        }
        Ok(Err(e)) => {
            return Err(ForgeError::ToolFailed {
                tool,
                status: "spawn failed".into(),
                stderr: e.to_string(),
            })
        }
        Ok(Ok(o)) => o,
    };

    if !output.status.success() {
        return Err(ForgeError::ToolFailed {
            tool,
            status: output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".into()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

async fn read_utf8(path: &Path) -> Result<String, ForgeError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ForgeError::from_input_io(path, e))?;
    String::from_utf8(bytes).map_err(|e| ForgeError::NotUtf8 {
        path: path.to_path_buf(),
        detail: e.utf8_error().to_string(),
    })
}
