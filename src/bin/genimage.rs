//! CLI binary: one prompt → one image via the Gemini image API.

use anyhow::{Context, Result};
use clap::Parser;
use docforge::cli::{self, bold, cyan, dim, green, red};
use docforge::config::DEFAULT_API_BASE;
use docforge::imagegen::default_output_path;
use docforge::output::{format_kb, preview};
use docforge::{generate_image, ImageGenConfig, ImageModel};
use std::path::PathBuf;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Square image with the fast model
  genimage -p "A minimalist logo of a paper crane"

  # Wide banner with the pro model
  genimage -p "Futuristic city skyline banner" -m gemini-3-pro-image-preview -a 16:9 -o banner.png

  # Keep a character consistent across images
  genimage -p "The same character, now waving" -r character.png -o waving.png

MODELS:
  gemini-2.5-flash-image          fast, square output (default)
  gemini-2.5-flash-image-preview  preview of the flash model
  gemini-3-pro-image-preview      best text rendering, wide output

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY    Google AI Studio API key
  GOOGLE_API_KEY    Fallback when GEMINI_API_KEY is unset
  GEMINI_API_BASE   Override the API endpoint
"#;

/// Generate an image from a text prompt.
#[derive(Parser, Debug)]
#[command(
    name = "genimage",
    version,
    about = "Generate an image from a text prompt with Gemini",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Text prompt describing the image.
    #[arg(short, long)]
    prompt: String,

    /// Output path [default: output/image_<timestamp>.png].
    #[arg(short, long, env = "GENIMAGE_OUTPUT")]
    output: Option<PathBuf>,

    /// Model id.
    #[arg(short, long, env = "GENIMAGE_MODEL", default_value = "gemini-2.5-flash-image",
          value_parser = ["gemini-2.5-flash-image", "gemini-2.5-flash-image-preview", "gemini-3-pro-image-preview"])]
    model: String,

    /// Reference image (repeatable). Sent before the prompt.
    #[arg(short, long = "reference")]
    references: Vec<PathBuf>,

    /// Aspect ratio such as 16:9 or 1:1.
    #[arg(short, long, env = "GENIMAGE_ASPECT_RATIO")]
    aspect_ratio: Option<String>,

    /// Retries on rate limits and server errors.
    #[arg(long, env = "GENIMAGE_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "GENIMAGE_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// API endpoint.
    #[arg(long, env = "GEMINI_API_BASE", default_value = DEFAULT_API_BASE, hide = true)]
    api_base: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GENIMAGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the saved path.
    #[arg(short, long, env = "GENIMAGE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    cli::load_dotenv();
    let cli = Cli::parse();
    cli::init_logging(cli.verbose, cli.quiet);

    let model: ImageModel = cli.model.parse().context("Invalid model")?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(chrono::Local::now().naive_local()));

    let mut builder = ImageGenConfig::builder()
        .model(model)
        .api_base(cli.api_base.clone())
        .references(cli.references.clone())
        .max_retries(cli.max_retries)
        .request_timeout_secs(cli.timeout);
    if let Some(ref ratio) = cli.aspect_ratio {
        builder = builder.aspect_ratio(ratio.clone());
    }
    let config = builder.build().context("Invalid configuration")?;

    if !cli.quiet {
        cli::banner("Gemini image generation");
        cli::field("Model", cyan(model.id()));
        cli::field("Prompt", preview(&cli.prompt, 100));
        if !cli.references.is_empty() {
            cli::field("References", cli.references.len());
        }
        if let Some(ref ratio) = cli.aspect_ratio {
            cli::field("Aspect", ratio);
        }
        eprintln!();
    }

    let spinner = (!cli.quiet).then(|| cli::spinner("Generating", "waiting for the model…"));
    let result = generate_image(&cli.prompt, &output, &config).await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    let out = match result {
        Ok(out) => out,
        Err(e) => {
            if !cli.quiet {
                let reason = e.to_string();
                let reason = reason.lines().next().unwrap_or_default();
                eprintln!("\n{} Result: failed ({reason})\n", red("✘"));
            }
            return Err(e).context("Image generation failed");
        }
    };

    if !cli.quiet {
        for r in &out.references {
            cli::field("Reference", r.display());
        }
        let skipped = cli.references.len().saturating_sub(out.references.len());
        if skipped > 0 {
            eprintln!("  {}", dim(&format!("{skipped} reference image(s) skipped, see warnings")));
        }
    }
    for image in &out.images {
        println!("{}", image.path.display());
        if !cli.quiet {
            eprintln!(
                "  {} saved {} {}",
                green("✓"),
                bold(&image.path.display().to_string()),
                dim(&format!("({}, {})", image.mime_type, format_kb(image.bytes)))
            );
        }
    }
    if !cli.quiet {
        if let Some(ref text) = out.text {
            eprintln!("\n{}\n{text}", dim("Model response:"));
        }
        eprintln!(
            "\n{} Result: {} image(s) in {:.1}s after {} attempt(s)",
            green("✔"),
            out.images.len(),
            out.duration_ms as f64 / 1000.0,
            out.attempts
        );
    }
    Ok(())
}
