//! CLI binary: Markdown → slide deck via the marp CLI.

use anyhow::{Context, Result};
use clap::Parser;
use docforge::cli::{self, bold, dim, green};
use docforge::output::format_kb;
use docforge::{render_slides, MarpTheme, SlideConfig, StageProgress};
use std::path::PathBuf;

const AFTER_HELP: &str = r#"EXAMPLES:
  # talk.md → talk.pdf
  marp2pdf talk.md

  # Gaia theme, plus an HTML deck, adding front-matter when missing
  marp2pdf talk.md out/talk.pdf --theme gaia --html --add-frontmatter

SLIDES:
  Separate slides with a line containing only ---. Files need marp
  front-matter (marp: true); --add-frontmatter inserts it in place.

SETUP:
  npm install -g @marp-team/marp-cli     global install
  npx @marp-team/marp-cli --version      or run through npx
  brew install marp-cli                  macOS

ENVIRONMENT VARIABLES:
  MARP_CLI_PATH   marp executable to use
"#;

/// Render a Markdown slide deck with marp.
#[derive(Parser, Debug)]
#[command(
    name = "marp2pdf",
    version,
    about = "Render Markdown slides to PDF (and HTML) with marp",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown slide file.
    input: PathBuf,

    /// PDF path [default: <input>.pdf].
    output: Option<PathBuf>,

    /// Theme: default, gaia, uncover.
    #[arg(long, env = "MARP2PDF_THEME", default_value = "default",
          value_parser = ["default", "gaia", "uncover"])]
    theme: String,

    /// Also write an HTML deck next to the PDF.
    #[arg(long, env = "MARP2PDF_HTML")]
    html: bool,

    /// Insert marp front-matter into the input when missing.
    #[arg(long, env = "MARP2PDF_ADD_FRONTMATTER")]
    add_frontmatter: bool,

    /// Seconds allowed per marp run.
    #[arg(long, env = "MARP2PDF_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// marp executable [default: auto-detect].
    #[arg(long, env = "MARP_CLI_PATH")]
    marp: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MARP2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the saved paths.
    #[arg(short, long, env = "MARP2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    cli::load_dotenv();
    let cli = Cli::parse();
    cli::init_logging(cli.verbose, cli.quiet);

    anyhow::ensure!(cli.input.exists(), "Markdown file not found: {}", cli.input.display());
    let theme: MarpTheme = cli.theme.parse().context("Invalid theme")?;

    let spinner = (!cli.quiet).then(|| cli::StageSpinner::new("Rendering"));
    let mut builder = SlideConfig::builder()
        .theme(theme)
        .html_output(cli.html)
        .add_frontmatter(cli.add_frontmatter)
        .timeout_secs(cli.timeout);
    if let Some(ref marp) = cli.marp {
        builder = builder.marp_path(marp);
    }
    if let Some(ref s) = spinner {
        let cb: StageProgress = s.clone();
        builder = builder.stage_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    if !cli.quiet {
        cli::banner("Markdown → slides");
        cli::field("Input", cli.input.display());
        cli::field("Theme", theme);
        eprintln!();
    }

    let result = render_slides(&cli.input, cli.output.as_deref(), &config).await;
    if let Some(ref s) = spinner {
        if result.is_ok() {
            s.finish();
        } else {
            s.fail();
        }
    }
    let deck = result.context("Slide rendering failed")?;

    println!("{}", deck.pdf_path.display());
    if let Some(ref p) = deck.html_path {
        println!("{}", p.display());
    }
    if !cli.quiet {
        eprintln!();
        if deck.frontmatter_added {
            eprintln!("  {} added marp front-matter to {}", dim("•"), cli.input.display());
        }
        eprintln!(
            "{} {} {}",
            green("✔"),
            bold(&deck.pdf_path.display().to_string()),
            dim(&format!("({})", format_kb(deck.pdf_bytes)))
        );
        if let (Some(p), Some(n)) = (&deck.html_path, deck.html_bytes) {
            eprintln!(
                "{} {} {}",
                green("✔"),
                bold(&p.display().to_string()),
                dim(&format!("({})", format_kb(n)))
            );
        }
        eprintln!("{}", cli::open_hint(&deck.pdf_path));
    }
    Ok(())
}
