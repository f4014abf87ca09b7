use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use emolens_core::{Models, Pipeline};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "emolens", about = "Face detection and emotion recognition on a local image")]
struct Cli {
    /// Directory containing the model files
    #[arg(long, global = true, env = "EMOLENS_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Detector model file name inside the model directory
    #[arg(long, global = true, default_value = emolens_core::DEFAULT_DETECTOR_MODEL)]
    detector_model: String,

    /// Emotion model file name inside the model directory
    #[arg(long, global = true, default_value = emolens_core::DEFAULT_EMOTION_MODEL)]
    emotion_model: String,

    /// ONNX Runtime intra-op thread count for the emotion model
    #[arg(long, global = true, env = "EMOLENS_INTRA_THREADS", default_value_t = 2)]
    intra_threads: usize,

    /// Treat the input file as base64 text (optionally a data URI) instead of image bytes
    #[arg(long, global = true)]
    base64: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print bounding boxes of all detected faces
    Detect {
        /// Image file
        path: PathBuf,
    },
    /// Print the dominant emotion of the largest face
    Emotion {
        /// Image file
        path: PathBuf,
    },
    /// Run an arbitrary task name ("detection" or "emotion")
    Process {
        #[arg(short, long)]
        task: String,
        /// Image file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (task, path) = match &cli.command {
        Commands::Detect { path } => ("detection", path),
        Commands::Emotion { path } => ("emotion", path),
        Commands::Process { task, path } => (task.as_str(), path),
    };

    let payload = read_payload(path, cli.base64)?;

    let model_dir = cli.model_dir.clone().unwrap_or_else(emolens_core::default_model_dir);
    let detector_path = model_dir.join(&cli.detector_model);
    let emotion_path = model_dir.join(&cli.emotion_model);

    let models = Models::load(
        &detector_path.to_string_lossy(),
        &emotion_path.to_string_lossy(),
        cli.intra_threads,
    )
    .context("loading models")?;
    let pipeline = Pipeline::new(models);

    let result = pipeline.run(&payload, task)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// Read the input as the base64 payload the pipeline expects.
fn read_payload(path: &Path, is_base64: bool) -> Result<String> {
    if is_base64 {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    } else {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(STANDARD.encode(bytes))
    }
}
