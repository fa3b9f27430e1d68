//! CLI binary: generate every image of a prompt catalogue.

use anyhow::{Context, Result};
use clap::Parser;
use docforge::cli::{self, bold, cyan, dim, green, red};
use docforge::config::DEFAULT_API_BASE;
use docforge::output::preview;
use docforge::{run_batch, BatchConfig, BatchProgress, ImageGenConfig, ImageModel, PromptCatalog};
use std::path::PathBuf;

const AFTER_HELP: &str = r#"EXAMPLES:
  # List the built-in prompts (no API key needed)
  batchimage --list

  # Generate all built-in images
  batchimage

  # Only one prompt, faster pacing
  batchimage -s ai_agent_1 -d 0.5

  # Your own catalogue, with a JSON report
  batchimage -c prompts.json -o out/images --report out/report.json

CATALOGUE FORMATS:
  {"images": [{"name": "hero", "prompt": "...", "category": "web"}]}
  {"hero": {"prompt": "...", "category": "web"}}

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY    Google AI Studio API key
  GOOGLE_API_KEY    Fallback when GEMINI_API_KEY is unset
"#;

/// Generate many images from a prompt catalogue.
#[derive(Parser, Debug)]
#[command(
    name = "batchimage",
    version,
    about = "Generate a catalogue of images with Gemini, one request at a time",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Root directory; images land in <dir>/<category>/<name>.png.
    #[arg(short, long, env = "BATCHIMAGE_OUTPUT_DIR", default_value = "output/fiverr-images")]
    output_dir: PathBuf,

    /// JSON prompt catalogue [default: built-in catalogue].
    #[arg(short, long, env = "BATCHIMAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds to wait between requests.
    #[arg(short, long, env = "BATCHIMAGE_DELAY", default_value_t = 2.0)]
    delay: f64,

    /// List the catalogue and exit.
    #[arg(short, long)]
    list: bool,

    /// Generate only the entry with this key.
    #[arg(short, long, env = "BATCHIMAGE_SINGLE")]
    single: Option<String>,

    /// Model id.
    #[arg(long, env = "BATCHIMAGE_MODEL", default_value = "gemini-3-pro-image-preview",
          value_parser = ["gemini-2.5-flash-image", "gemini-2.5-flash-image-preview", "gemini-3-pro-image-preview"])]
    model: String,

    /// Write a JSON report of every item to this path.
    #[arg(long, env = "BATCHIMAGE_REPORT")]
    report: Option<PathBuf>,

    /// Retries per image on rate limits and server errors.
    #[arg(long, env = "BATCHIMAGE_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// API endpoint.
    #[arg(long, env = "GEMINI_API_BASE", default_value = DEFAULT_API_BASE, hide = true)]
    api_base: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BATCHIMAGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BATCHIMAGE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    cli::load_dotenv();
    let cli = Cli::parse();
    cli::init_logging(cli.verbose, cli.quiet);

    let catalog = match cli.config {
        Some(ref path) => PromptCatalog::from_file(path)
            .await
            .with_context(|| format!("Failed to load prompt catalogue {}", path.display()))?,
        None => PromptCatalog::builtin().context("Built-in catalogue is invalid")?,
    };

    if cli.list {
        print_catalog(&catalog);
        return Ok(());
    }

    let catalog = match cli.single {
        Some(ref key) => catalog.select(key).context("Unknown prompt")?,
        None => catalog,
    };

    let model: ImageModel = cli.model.parse().context("Invalid model")?;
    let image = ImageGenConfig::builder()
        .model(model)
        .api_base(cli.api_base.clone())
        .max_retries(cli.max_retries)
        .build()
        .context("Invalid configuration")?;

    let mut builder = BatchConfig::builder().image(image).delay_secs(cli.delay);
    if !cli.quiet {
        let bar: BatchProgress = cli::BatchProgressBar::new();
        builder = builder.progress_callback(bar);
    }
    let config = builder.build().context("Invalid configuration")?;

    if !cli.quiet {
        cli::banner("Batch image generation");
        cli::field("Model", cyan(model.id()));
        cli::field("Images", catalog.len());
        cli::field("Output", cli.output_dir.display());
        cli::field("Delay", format!("{:.1}s", config.delay.as_secs_f64()));
        eprintln!();
    }

    let report = run_batch(&catalog, &cli.output_dir, &config)
        .await
        .context("Batch generation failed")?;

    if let Some(ref path) = cli.report {
        report
            .write_json(path)
            .await
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    for item in report.images.iter().filter(|i| i.is_success()) {
        if let Some(ref p) = item.path {
            println!("{}", p.display());
        }
    }

    if !cli.quiet {
        eprintln!();
        cli::banner("Summary");
        cli::field("Total", report.total);
        cli::field("Succeeded", green(&report.success.to_string()));
        let failed = report.failed.to_string();
        cli::field(
            "Failed",
            if report.failed > 0 { red(&failed) } else { failed },
        );
        cli::field("Duration", format!("{:.1}s", report.duration_ms as f64 / 1000.0));
        cli::field("Output", cli.output_dir.display());
        if let Some(ref path) = cli.report {
            cli::field("Report", path.display());
        }
        for item in report.images.iter().filter(|i| !i.is_success()) {
            if let Some(ref e) = item.error {
                eprintln!("  {} {}: {}", red("✗"), bold(&item.key), dim(&e.to_string()));
            }
        }
    }

    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_catalog(catalog: &PromptCatalog) {
    println!("{} prompt(s):\n", catalog.len());
    for entry in catalog.entries() {
        println!("  {}", bold(&entry.key));
        println!("    {} {}", dim("name:    "), entry.name);
        println!("    {} {}", dim("category:"), entry.category);
        println!("    {} {}", dim("prompt:  "), preview(&entry.prompt, 100));
        println!();
    }
}
