//! Markdown → styled PDF.
//!
//! ```text
//! notes.md
//!  │
//!  ├─ 1. Read      UTF-8 text
//!  ├─ 2. Render    Markdown → HTML (highlighting, slugs, TOC, stylesheet)
//!  ├─ 3. Load      temporary HTML in headless Chromium, <base> = input dir
//!  └─ 4. Print     print-to-PDF honouring @page size, with backgrounds
//! ```

pub mod render;
pub mod style;

pub use render::{escape_html, markdown_to_html, render_body, slugify, HtmlOptions};
pub use style::DEFAULT_STYLESHEET;

use crate::browser::{step_failed, BrowserSession};
use crate::config::MarkdownPdfConfig;
use crate::error::ForgeError;
use crate::output::{write_output, RenderedDocument};
use crate::progress::{report_stage, Stage};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// The input path with a `.pdf` extension.
pub fn default_pdf_path(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

/// `file://` URL of the directory holding `input`, with a trailing slash.
async fn base_href(input: &Path) -> Result<String, ForgeError> {
    let abs = tokio::fs::canonicalize(input)
        .await
        .map_err(|e| ForgeError::from_input_io(input, e))?;
    let dir = abs.parent().unwrap_or(&abs);
    reqwest::Url::from_directory_path(dir)
        .map(|u| u.to_string())
        .map_err(|_| ForgeError::InvalidInput {
            input: dir.display().to_string(),
            reason: "cannot be expressed as a file:// URL".into(),
        })
}

/// Renders the Markdown file at `input` into a PDF.
///
/// When `output` is None the PDF is written next to the input.
pub async fn convert_markdown_to_pdf(
    input: impl AsRef<Path>,
    output: Option<&Path>,
    config: &MarkdownPdfConfig,
) -> Result<RenderedDocument, ForgeError> {
    let input = input.as_ref();
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| ForgeError::from_input_io(input, e))?;
    let markdown = String::from_utf8(bytes).map_err(|e| ForgeError::NotUtf8 {
        path: input.to_path_buf(),
        detail: e.utf8_error().to_string(),
    })?;
    let pdf_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_pdf_path(input));
    let title = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into());

    report_stage(&config.stage_callback, Stage::RenderHtml);
    let options = HtmlOptions {
        guess_lang: config.guess_lang,
        extra_css: config.extra_css.clone(),
        base_href: Some(base_href(input).await?),
    };
    let html = markdown_to_html(&markdown, &title, &options);
    info!("Rendered {} ({} bytes of HTML)", input.display(), html.len());

    let mut page_file = tempfile::Builder::new()
        .prefix("docforge-")
        .suffix(".html")
        .tempfile()
        .map_err(|e| ForgeError::Internal(format!("creating temp HTML: {e}")))?;
    page_file
        .write_all(html.as_bytes())
        .and_then(|_| page_file.flush())
        .map_err(|e| ForgeError::Internal(format!("writing temp HTML: {e}")))?;

    report_stage(&config.stage_callback, Stage::LaunchBrowser);
    let session = BrowserSession::launch(&config.browser).await?;
    let result = print_page(&session, page_file.path(), config).await;
    session.close().await;
    let pdf = result?;

    report_stage(&config.stage_callback, Stage::WriteOutput);
    write_output(&pdf_path, &pdf).await?;
    let html_path = if config.keep_html {
        let p = pdf_path.with_extension("html");
        write_output(&p, html.as_bytes()).await?;
        Some(p)
    } else {
        None
    };
    info!("Saved {} ({} bytes)", pdf_path.display(), pdf.len());

    Ok(RenderedDocument {
        pdf_path,
        pdf_bytes: pdf.len(),
        html_path,
        title,
    })
}

async fn print_page(
    session: &BrowserSession,
    html: &Path,
    config: &MarkdownPdfConfig,
) -> Result<Vec<u8>, ForgeError> {
    report_stage(&config.stage_callback, Stage::LoadPage);
    let page = session.open_file(html).await?;

    report_stage(&config.stage_callback, Stage::PrintPdf);
    let params = PrintToPdfParams {
        print_background: Some(true),
        prefer_css_page_size: Some(true),
        ..Default::default()
    };
    page.pdf(params).await.map_err(|e| step_failed("print to PDF", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pdf_path_replaces_extension() {
        assert_eq!(
            default_pdf_path(Path::new("docs/README.md")),
            PathBuf::from("docs/README.pdf")
        );
    }

    #[tokio::test]
    async fn base_href_points_at_input_directory() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("doc.md");
        std::fs::write(&md, "# x").unwrap();
        let href = base_href(&md).await.unwrap();
        assert!(href.starts_with("file:///"));
        assert!(href.ends_with('/'));
        assert!(!href.ends_with("doc.md/"));
    }

    #[tokio::test]
    async fn missing_input_is_not_found() {
        let err = convert_markdown_to_pdf("/no/such/file.md", None, &MarkdownPdfConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn non_utf8_input_is_rejected_before_browser_work() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("latin1.md");
        std::fs::write(&md, [0x48, 0x69, 0xff, 0xfe]).unwrap();
        let err = convert_markdown_to_pdf(&md, None, &MarkdownPdfConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::NotUtf8 { .. }));
    }
}
