// Command-line runner: analyzes every image/mask pair in a directory.

use anyhow::{Context, Result, bail};
use clap::Parser;
use fa_analyzer::{AnalysisPipeline, PipelineConfig, analyze_directory};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "fa_analyzer")]
#[command(version, about = "Focal adhesion morphometry for cell images", long_about = None)]
struct Cli {
    /// Directory containing images and their masks
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Peripheral threshold as a fraction of the maximum border distance
    #[arg(long, value_name = "F")]
    periph_frac: Option<f64>,

    /// Suffix that marks mask files
    #[arg(long, value_name = "S")]
    mask_suffix: Option<String>,

    /// Image file extension, including the dot
    #[arg(long, value_name = "E")]
    ext: Option<String>,

    /// Smallest object kept by segmentation, in pixels
    #[arg(long, value_name = "N")]
    min_object_px: Option<usize>,

    /// Gaussian sigma applied before thresholding
    #[arg(long, value_name = "S")]
    blur_sigma: Option<f32>,

    /// JSON configuration file; command-line flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log per-image details
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(periph_frac) = self.periph_frac {
            config.periph_frac = periph_frac;
        }
        if let Some(mask_suffix) = &self.mask_suffix {
            config.mask_suffix = mask_suffix.clone();
        }
        if let Some(ext) = &self.ext {
            config.file_ending = ext.clone();
        }
        if let Some(min_object_px) = self.min_object_px {
            config.min_object_px = min_object_px;
        }
        if let Some(blur_sigma) = self.blur_sigma {
            config.blur_sigma = blur_sigma;
        }
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.dir.is_dir() {
        bail!("{} is not a directory", cli.dir.display());
    }

    let config = cli.pipeline_config()?;
    let pipeline = AnalysisPipeline::new(config).context("invalid configuration")?;
    let report = analyze_directory(&pipeline, &cli.dir)
        .with_context(|| format!("failed to analyze {}", cli.dir.display()))?;

    info!(
        analyzed = report.analyzed.len(),
        skipped = report.skipped.len(),
        "done"
    );
    Ok(())
}
