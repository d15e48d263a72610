use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use floorscan::{
    DetectionOrchestrator, DetectorConfig, FsResultStore, ImageNormalizer, PipelineConfig,
    ResultRepository,
};

#[derive(Parser)]
#[command(name = "floorscan")]
#[command(about = "Detect walls, windows and doors in floor plan images")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding processed images, annotated output and result records
    #[arg(long, value_name = "DIR", default_value = "data")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full detection pipeline on one image
    Detect {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// JSON pipeline configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Use the Mask R-CNN backend with these .rten weights
        #[arg(long, value_name = "FILE", conflicts_with = "seed")]
        weights: Option<PathBuf>,

        /// Seed for the synthetic detector
        #[arg(long)]
        seed: Option<u64>,

        /// Save debug outputs to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },
    /// List stored results, most recent first
    List {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print one stored result
    Show {
        #[arg(value_name = "ID")]
        id: Uuid,

        #[command(flatten)]
        store: StoreArgs,
    },
    /// Only normalize an image and write the canvas as PNG
    Normalize {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[arg(value_name = "OUT")]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Detect {
            image_path,
            store,
            config,
            weights,
            seed,
            debug_out,
        } => {
            let mut config = match config {
                Some(path) => PipelineConfig::from_file(&path)?,
                None => PipelineConfig::default(),
            };
            if let Some(weights) = weights {
                config.detector = DetectorConfig::MaskRcnn { weights };
            } else if let Some(seed) = seed {
                config.detector = DetectorConfig::Synthetic { seed: Some(seed) };
            }

            let mut orchestrator = DetectionOrchestrator::open(config, &store.data_dir).await?;
            if let Some(dir) = debug_out {
                orchestrator = orchestrator.with_debug(dir)?;
            }

            let result = orchestrator
                .process_image(&image_path)
                .await
                .with_context(|| format!("Failed to process {}", image_path.display()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::List { store } => {
            let store = open_store(&store).await?;
            let results = store.list().await?;
            if results.is_empty() {
                println!("No results stored in {}", store.layout().root().display());
            }
            for result in &results {
                let when = result
                    .timestamp
                    .and_then(|ts| ts.format(&time::format_description::well_known::Rfc3339).ok())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {}  {}  walls={} windows={} doors={}",
                    result.id,
                    when,
                    result.filename,
                    result.elements.walls.len(),
                    result.elements.windows.len(),
                    result.elements.doors.len()
                );
            }
        }
        Command::Show { id, store } => {
            let store = open_store(&store).await?;
            let result = store.get(id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Normalize { image_path, output } => {
            let normalized = ImageNormalizer::new().normalize_file(&image_path)?;
            normalized.save(&output)?;
            println!(
                "Wrote {}x{} canvas to {}",
                normalized.canvas_size(),
                normalized.canvas_size(),
                output.display()
            );
        }
    }

    Ok(())
}

async fn open_store(args: &StoreArgs) -> anyhow::Result<FsResultStore> {
    let prefix = PipelineConfig::default().image_url_prefix;
    Ok(FsResultStore::open(&args.data_dir, prefix).await?)
}
