// Command-line entry point. The library in lib.rs holds everything else.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use image_compressor_lib::utils::fs::{collect_inputs, write_output};
use image_compressor_lib::{
    AppState,
    BatchSummary,
    CompressorConfig,
    ImageItem,
    ItemStatus,
    OutputFormat,
    compress_batch,
    format_savings,
    validate_settings,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpeg,
    Webp,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Webp => OutputFormat::WebP,
        }
    }
}

#[derive(Parser)]
#[command(name = "image-compressor", version)]
#[command(about = "Compress a batch of images to JPEG or WebP on this machine", long_about = None)]
struct Cli {
    /// Image files or directories of images
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the compressed files are written to
    #[arg(short, long, default_value = "compressed")]
    out: PathBuf,

    /// Encoder quality, 1-100 (default from config, else 80)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Output format (default from config, else jpeg)
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Images compressed at once; 0 or unset picks the device default
    #[arg(short, long)]
    parallelism: Option<usize>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(false)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CompressorConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CompressorConfig::default(),
    };
    let state = AppState::new(config);

    let mut settings = state.config().default_settings();
    if let Some(quality) = cli.quality {
        settings.quality = quality;
    }
    if let Some(format) = cli.format {
        settings.output_format = format.into();
    }
    if let Some(parallelism) = cli.parallelism {
        settings.parallelism = (parallelism > 0).then_some(parallelism);
    }
    validate_settings(&settings, state.governor().max_parallelism())?;

    let paths = collect_inputs(&cli.inputs).await?;
    let mut items = Vec::with_capacity(paths.len());
    for path in &paths {
        match ImageItem::from_path(path).await {
            Ok(item) => items.push(item),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    if items.is_empty() {
        warn!("No images to compress");
        return Ok(());
    }

    info!("=== Compressing {} images ===", items.len());
    let start = Instant::now();
    let items = compress_batch(&state, items, &settings, |item: &ImageItem| {
        debug!("{} is {}", item.name, item.status().name());
    })
    .await
    .context("Could not start the compression pool")?;

    for item in &items {
        match item.status() {
            ItemStatus::Done(output) => match write_output(&cli.out, output).await {
                Ok(target) => println!(
                    "{} -> {} ({})",
                    item.name,
                    target.display(),
                    format_savings(output.percent_saved)
                ),
                Err(e) => error!("{}", e),
            },
            ItemStatus::Error { message } => println!("{} failed: {}", item.name, message),
            other => warn!("{} finished as {}", item.name, other.name()),
        }
    }

    println!("{}", BatchSummary::from_items(&items, start.elapsed()));
    state.shutdown().await;
    Ok(())
}
