//! CLI binary: HTML page → one long PNG (and a single-page PDF of it).

use anyhow::{Context, Result};
use clap::Parser;
use docforge::capture::{default_image_path, pdf::DEFAULT_DPI};
use docforge::cli::{self, bold, dim, green};
use docforge::output::format_kb;
use docforge::{capture_long_image, capture_to_pdf, BrowserOptions, CaptureConfig, StageProgress};
use std::path::PathBuf;

const AFTER_HELP: &str = r#"EXAMPLES:
  # page.html → page_fullpage.png + page_fullpage.pdf
  html2img page.html

  # Image only, custom name
  html2img page.html -o shot.png --no-pdf

  # Mobile-width capture, revealing scroll-animated cards
  html2img landing.html --width 390 --height 844 --reveal ".card, .hero"

  # Inside a container
  html2img page.html --no-sandbox

ENVIRONMENT VARIABLES:
  CHROME_PATH   Chrome / Chromium / Edge executable to use
"#;

/// Capture an HTML page as one long screenshot.
#[derive(Parser, Debug)]
#[command(
    name = "html2img",
    version,
    about = "Capture an HTML page as one long screenshot and PDF with headless Chromium",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTML file to capture.
    input: PathBuf,

    /// Image path [default: <input>_fullpage.png].
    #[arg(short, long, env = "HTML2IMG_OUTPUT")]
    output: Option<PathBuf>,

    /// PDF path [default: image path with .pdf].
    #[arg(long, env = "HTML2IMG_PDF", conflicts_with = "no_pdf")]
    pdf: Option<PathBuf>,

    /// Skip the PDF.
    #[arg(long, env = "HTML2IMG_NO_PDF")]
    no_pdf: bool,

    /// Viewport width in CSS pixels.
    #[arg(long, env = "HTML2IMG_WIDTH", default_value_t = 1200)]
    width: u32,

    /// Viewport height in CSS pixels.
    #[arg(long, env = "HTML2IMG_HEIGHT", default_value_t = 800)]
    height: u32,

    /// Pixels per scroll step while triggering lazy content.
    #[arg(long, env = "HTML2IMG_SCROLL_STEP", default_value_t = 1000)]
    scroll_step: u32,

    /// CSS selectors forced visible before capture.
    #[arg(long, env = "HTML2IMG_REVEAL", default_value = ".section, .cover")]
    reveal: String,

    /// PDF resolution (pixels per inch).
    #[arg(long, env = "HTML2IMG_DPI", default_value_t = DEFAULT_DPI)]
    dpi: f32,

    /// Browser executable [default: auto-detect].
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Launch the browser without its sandbox (containers, CI).
    #[arg(long, env = "HTML2IMG_NO_SANDBOX")]
    no_sandbox: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HTML2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the saved paths.
    #[arg(short, long, env = "HTML2IMG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    cli::load_dotenv();
    let cli = Cli::parse();
    cli::init_logging(cli.verbose, cli.quiet);

    anyhow::ensure!(cli.input.exists(), "HTML file not found: {}", cli.input.display());

    let browser = BrowserOptions {
        chrome_path: cli.chrome.clone(),
        no_sandbox: cli.no_sandbox,
        ..BrowserOptions::default()
    };
    let spinner = (!cli.quiet).then(|| cli::StageSpinner::new("Capturing"));
    let mut builder = CaptureConfig::builder()
        .browser(browser)
        .viewport(cli.width, cli.height)
        .scroll_step(cli.scroll_step)
        .reveal_selectors(cli.reveal.clone())
        .pdf_dpi(cli.dpi);
    if let Some(ref s) = spinner {
        let cb: StageProgress = s.clone();
        builder = builder.stage_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let image_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_image_path(&cli.input));
    if !cli.quiet {
        cli::banner("HTML → long image");
        cli::field("Input", cli.input.display());
        cli::field("Image", image_path.display());
        cli::field("Viewport", format!("{}×{}", cli.width, cli.height));
        eprintln!();
    }

    let result = if cli.no_pdf {
        capture_long_image(&cli.input, Some(&image_path), &config).await
    } else {
        capture_to_pdf(&cli.input, Some(&image_path), cli.pdf.as_deref(), &config).await
    };
    if let Some(ref s) = spinner {
        if result.is_ok() {
            s.finish();
        } else {
            s.fail();
        }
    }
    let out = result.context("Capture failed")?;

    println!("{}", out.image_path.display());
    if let Some(ref p) = out.pdf_path {
        println!("{}", p.display());
    }
    if !cli.quiet {
        eprintln!();
        eprintln!(
            "{} {} {}",
            green("✔"),
            bold(&out.image_path.display().to_string()),
            dim(&format!(
                "({}, {}px tall, {} scroll stops)",
                format_kb(out.image_bytes),
                out.page_height,
                out.scroll_stops
            ))
        );
        if let (Some(p), Some(n)) = (&out.pdf_path, out.pdf_bytes) {
            eprintln!(
                "{} {} {}",
                green("✔"),
                bold(&p.display().to_string()),
                dim(&format!("({})", format_kb(n)))
            );
        }
        eprintln!("{}", cli::open_hint(&out.image_path));
        if let Some(ref p) = out.pdf_path {
            eprintln!("{}", cli::open_hint(p));
        }
    }
    Ok(())
}
