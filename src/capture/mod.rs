//! HTML → one long screenshot → single-page PDF.
//!
//! Print-to-PDF splits a page wherever the paper ends. Capturing the whole
//! document as one PNG first and wrapping that in a PDF keeps long
//! landing-page style documents in one piece.
//!
//! ```text
//! page.html
//!  │
//!  ├─ 1. Load      headless Chromium, 1200×800 viewport, file:// URL
//!  ├─ 2. Reveal    kill animations, force scroll-reveal blocks visible
//!  ├─ 3. Scroll    visit every scroll step so lazy content loads
//!  ├─ 4. Capture   full-page PNG → <stem>_fullpage.png
//!  └─ 5. PDF       PNG → one page sized to the image (see [`image_to_pdf`])
//! ```

pub mod pdf;

pub use pdf::{default_pdf_path, image_to_pdf};

use crate::browser::{eval, step_failed, BrowserSession};
use crate::config::CaptureConfig;
use crate::error::ForgeError;
use crate::output::{write_output, CaptureOutput};
use crate::progress::{report_stage, Stage};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use std::path::{Path, PathBuf};
use tracing::info;

/// `<dir>/<stem>_fullpage.png` next to the HTML file.
pub fn default_image_path(html: &Path) -> PathBuf {
    let stem = html
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".into());
    html.with_file_name(format!("{stem}_fullpage.png"))
}

/// Stylesheet that stops animations and forces `selectors` visible.
pub fn reveal_stylesheet(selectors: &str) -> String {
    let mut css = String::from(
        "*, *::before, *::after {\n  animation: none !important;\n  transition: none !important;\n}\n",
    );
    if !selectors.trim().is_empty() {
        css.push_str(&format!(
            "{selectors} {{\n  opacity: 1 !important;\n  transform: none !important;\n}}\n"
        ));
    }
    css
}

/// Script that injects [`reveal_stylesheet`] and sets the same styles inline.
///
/// Evaluates to the number of elements matched.
pub fn reveal_script(selectors: &str) -> String {
    let css = serde_json::to_string(&reveal_stylesheet(selectors)).unwrap_or_else(|_| "\"\"".into());
    let sel = serde_json::to_string(selectors.trim()).unwrap_or_else(|_| "\"\"".into());
    format!(
        "var __forgeStyle = document.createElement('style');\n\
         __forgeStyle.textContent = {css};\n\
         (document.head || document.documentElement).appendChild(__forgeStyle);\n\
         var __forgeSel = {sel};\n\
         var __forgeCount = 0;\n\
         if (__forgeSel) {{\n\
           document.querySelectorAll(__forgeSel).forEach(function (el) {{\n\
             el.style.opacity = '1';\n\
             el.style.transform = 'none';\n\
             __forgeCount += 1;\n\
           }});\n\
         }}\n\
         __forgeCount"
    )
}

/// Scroll positions `0, step, 2·step, …` strictly below `height`.
///
/// An empty page still gets the single stop `0`.
pub fn scroll_stops(height: u32, step: u32) -> Vec<u32> {
    let step = step.max(1);
    let mut stops: Vec<u32> = (0..height).step_by(step as usize).collect();
    if stops.is_empty() {
        stops.push(0);
    }
    stops
}

/// Renders `html` in headless Chromium and saves a single full-page PNG.
///
/// When `output` is None the image goes to [`default_image_path`].
/// The returned [`CaptureOutput`] has no PDF fields set; see
/// [`capture_to_pdf`] for the combined pipeline.
pub async fn capture_long_image(
    html: impl AsRef<Path>,
    output: Option<&Path>,
    config: &CaptureConfig,
) -> Result<CaptureOutput, ForgeError> {
    let html = html.as_ref();
    tokio::fs::metadata(html)
        .await
        .map_err(|e| ForgeError::from_input_io(html, e))?;
    let image_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_image_path(html));

    info!("Capturing {} → {}", html.display(), image_path.display());
    report_stage(&config.stage_callback, Stage::LaunchBrowser);
    let session = BrowserSession::launch(&config.browser).await?;
    let result = capture_in_session(&session, html, config).await;
    session.close().await;
    let (png, page_height, stops) = result?;

    report_stage(&config.stage_callback, Stage::WriteOutput);
    write_output(&image_path, &png).await?;
    info!("Saved {} ({} bytes, {}px tall)", image_path.display(), png.len(), page_height);

    Ok(CaptureOutput {
        image_path,
        image_bytes: png.len(),
        page_height,
        scroll_stops: stops,
        pdf_path: None,
        pdf_bytes: None,
    })
}

/// [`capture_long_image`] followed by [`image_to_pdf`] at
/// [`CaptureConfig::pdf_dpi`].
pub async fn capture_to_pdf(
    html: impl AsRef<Path>,
    image_output: Option<&Path>,
    pdf_output: Option<&Path>,
    config: &CaptureConfig,
) -> Result<CaptureOutput, ForgeError> {
    let mut out = capture_long_image(html, image_output, config).await?;
    report_stage(&config.stage_callback, Stage::EncodePdf);
    let pdf_path = pdf_output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_pdf_path(&out.image_path));
    let bytes = image_to_pdf(&out.image_path, &pdf_path, config.pdf_dpi).await?;
    out.pdf_path = Some(pdf_path);
    out.pdf_bytes = Some(bytes);
    Ok(out)
}

async fn capture_in_session(
    session: &BrowserSession,
    html: &Path,
    config: &CaptureConfig,
) -> Result<(Vec<u8>, u32, usize), ForgeError> {
    report_stage(&config.stage_callback, Stage::LoadPage);
    let page = session.open_file(html).await?;

    report_stage(&config.stage_callback, Stage::RevealContent);
    let revealed: u64 = eval(&page, "reveal content", &reveal_script(&config.reveal_selectors)).await?;
    info!("Forced {revealed} element(s) visible");

    report_stage(&config.stage_callback, Stage::ScrollPage);
    let height = scroll_through(&page, config).await?;
    let stops = scroll_stops(height, config.scroll_step).len();

    report_stage(&config.stage_callback, Stage::Screenshot);
    let png = page
        .screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build(),
        )
        .await
        .map_err(|e| step_failed("screenshot", e))?;
    Ok((png, height, stops))
}

/// Visits every scroll stop, returns to the top and lets the page settle.
async fn scroll_through(page: &Page, config: &CaptureConfig) -> Result<u32, ForgeError> {
    let height: f64 = eval(page, "measure page", "document.body.scrollHeight").await?;
    let height = height.max(0.0) as u32;

    for y in scroll_stops(height, config.scroll_step) {
        let _: bool = eval(page, "scroll", &format!("window.scrollTo(0, {y}); true")).await?;
        tokio::time::sleep(config.scroll_pause).await;
    }
    let _: bool = eval(page, "scroll", "window.scrollTo(0, 0); true").await?;
    tokio::time::sleep(config.settle).await;
    Ok(height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_image_path_sits_next_to_html() {
        assert_eq!(
            default_image_path(Path::new("site/report.html")),
            PathBuf::from("site/report_fullpage.png")
        );
    }

    #[test]
    fn scroll_stops_cover_the_page() {
        assert_eq!(scroll_stops(3500, 1000), vec![0, 1000, 2000, 3000]);
        assert_eq!(scroll_stops(1000, 1000), vec![0]);
        assert_eq!(scroll_stops(0, 1000), vec![0]);
    }

    #[test]
    fn stylesheet_disables_motion_and_reveals() {
        let css = reveal_stylesheet(".section, .cover");
        assert!(css.contains("animation: none !important"));
        assert!(css.contains("transition: none !important"));
        assert!(css.contains(".section, .cover {"));
        assert!(css.contains("opacity: 1 !important"));

        let bare = reveal_stylesheet("  ");
        assert!(!bare.contains("opacity"));
    }

    #[test]
    fn reveal_script_quotes_its_inputs() {
        let js = reveal_script(".a[data-x=\"1\"]");
        assert!(js.contains(r#"var __forgeSel = ".a[data-x=\"1\"]";"#));
        assert!(js.contains("el.style.opacity = '1'"));
        assert!(js.trim_end().ends_with("__forgeCount"));
        // must be evaluated as an expression, not as a function declaration
        assert!(!js.trim_start().starts_with("function"));
        assert!(!js.trim_start().starts_with('('));
    }

    #[tokio::test]
    async fn missing_html_fails_before_browser_launch() {
        let cfg = CaptureConfig::builder()
            .browser(crate::config::BrowserOptions {
                chrome_path: Some(PathBuf::from("/nonexistent/chrome")),
                ..Default::default()
            })
            .build()
            .unwrap();
        let err = capture_long_image("/no/such/page.html", None, &cfg)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::FileNotFound { .. }));
    }
}
