//! CLI binary: Markdown → styled PDF via headless Chromium.

use anyhow::{Context, Result};
use clap::Parser;
use docforge::cli::{self, bold, dim, green};
use docforge::output::format_kb;
use docforge::{convert_markdown_to_pdf, BrowserOptions, MarkdownPdfConfig, StageProgress};
use std::path::PathBuf;

const AFTER_HELP: &str = r#"EXAMPLES:
  # README.md → README.pdf
  md2pdf README.md

  # Explicit output and an extra stylesheet
  md2pdf notes.md out/notes.pdf --css print.css

  # Keep the intermediate HTML for debugging
  md2pdf notes.md --keep-html

MARKDOWN FEATURES:
  tables, strikethrough, task lists, footnotes, fenced code with
  highlighting, [TOC] on its own line, single newlines kept as breaks

ENVIRONMENT VARIABLES:
  CHROME_PATH   Chrome / Chromium / Edge executable to use
"#;

/// Convert a Markdown file to a styled PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown to a styled PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file.
    input: PathBuf,

    /// PDF path [default: <input>.pdf].
    output: Option<PathBuf>,

    /// Extra stylesheet appended after the built-in one.
    #[arg(long, env = "MD2PDF_CSS")]
    css: Option<PathBuf>,

    /// Also write the intermediate HTML next to the PDF.
    #[arg(long, env = "MD2PDF_KEEP_HTML")]
    keep_html: bool,

    /// Leave code blocks without a language unhighlighted.
    #[arg(long, env = "MD2PDF_NO_GUESS_LANG")]
    no_guess_lang: bool,

    /// Browser executable [default: auto-detect].
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Launch the browser without its sandbox (containers, CI).
    #[arg(long, env = "MD2PDF_NO_SANDBOX")]
    no_sandbox: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the saved path.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    cli::load_dotenv();
    let cli = Cli::parse();
    cli::init_logging(cli.verbose, cli.quiet);

    anyhow::ensure!(cli.input.exists(), "Markdown file not found: {}", cli.input.display());

    let extra_css = match cli.css {
        Some(ref path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read stylesheet {}", path.display()))?,
        ),
        None => None,
    };

    let spinner = (!cli.quiet).then(|| cli::StageSpinner::new("Converting"));
    let mut builder = MarkdownPdfConfig::builder()
        .browser(BrowserOptions {
            chrome_path: cli.chrome.clone(),
            no_sandbox: cli.no_sandbox,
            ..BrowserOptions::default()
        })
        .guess_lang(!cli.no_guess_lang)
        .keep_html(cli.keep_html);
    if let Some(css) = extra_css {
        builder = builder.extra_css(css);
    }
    if let Some(ref s) = spinner {
        let cb: StageProgress = s.clone();
        builder = builder.stage_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    if !cli.quiet {
        cli::banner("Markdown → PDF");
        cli::field("Input", cli.input.display());
        eprintln!();
    }

    let result = convert_markdown_to_pdf(&cli.input, cli.output.as_deref(), &config).await;
    if let Some(ref s) = spinner {
        if result.is_ok() {
            s.finish();
        } else {
            s.fail();
        }
    }
    let doc = result.context("Conversion failed")?;

    println!("{}", doc.pdf_path.display());
    if !cli.quiet {
        eprintln!();
        eprintln!(
            "{} {} {}",
            green("✔"),
            bold(&doc.pdf_path.display().to_string()),
            dim(&format!("({})", format_kb(doc.pdf_bytes)))
        );
        if let Some(ref html) = doc.html_path {
            eprintln!("  {} {}", dim("HTML:"), html.display());
        }
        eprintln!("{}", cli::open_hint(&doc.pdf_path));
    }
    Ok(())
}
