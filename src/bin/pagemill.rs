//! CLI binary for pagemill.
//!
//! A thin shim over the library: maps flags to a `PipelineConfig`, submits
//! one file against a remote OCR engine, and prints the terminal task
//! record.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagemill::{
    BoundingBox, PipelineConfig, PromptMode, RemoteEngine, SubmitOptions, TaskOrchestrator,
    TaskStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagemill", version, about = "Normalize a document and run OCR/layout extraction")]
struct Cli {
    /// Input document (image, PDF, .doc or .docx).
    input: PathBuf,

    /// Base URL of the OCR engine service.
    #[arg(long, env = "PAGEMILL_ENGINE_URL", default_value = "http://127.0.0.1:8000")]
    engine_url: String,

    /// OCR prompt mode.
    #[arg(long, value_enum, default_value = "full-layout")]
    mode: CliMode,

    /// Contrast/re-encode preprocessing for image inputs.
    #[arg(long)]
    preprocess: bool,

    /// Bounding box for grounded mode: x1,y1,x2,y2.
    #[arg(long, value_delimiter = ',', num_args = 4)]
    bbox: Option<Vec<i32>>,

    /// Rasterization DPI for PDF pages.
    #[arg(long, default_value_t = 200)]
    dpi: u32,

    /// Directory for task working directories and result artifacts.
    #[arg(long, default_value = "./results")]
    results_dir: PathBuf,

    /// Always use the in-process doc converter (skip LibreOffice probing).
    #[arg(long)]
    force_fallback: bool,

    /// Print the full task record as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliMode {
    FullLayout,
    LayoutOnly,
    TextOnly,
    Grounded,
}

impl From<CliMode> for PromptMode {
    fn from(m: CliMode) -> Self {
        match m {
            CliMode::FullLayout => PromptMode::FullLayout,
            CliMode::LayoutOnly => PromptMode::LayoutOnly,
            CliMode::TextOnly => PromptMode::TextOnly,
            CliMode::Grounded => PromptMode::GroundedWithBox,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let bbox = match &cli.bbox {
        Some(v) => Some(
            BoundingBox::new(v[0], v[1], v[2], v[3])
                .context("invalid --bbox (requires x1 < x2 and y1 < y2)")?,
        ),
        None => None,
    };

    let config = PipelineConfig::builder()
        .dpi(cli.dpi)
        .results_dir(&cli.results_dir)
        .force_fallback(cli.force_fallback)
        .build()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let engine = Arc::new(RemoteEngine::new(&cli.engine_url).map_err(|e| anyhow::anyhow!("{e}"))?);
    let orchestrator =
        TaskOrchestrator::new(engine, config).map_err(|e| anyhow::anyhow!("{e}"))?;

    let filename = cli
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .context("input path has no filename")?
        .to_string();

    let options = SubmitOptions {
        mode: cli.mode.into(),
        preprocess: cli.preprocess,
        bbox,
    };

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(format!("Processing {filename}…"));
    bar.enable_steady_tick(Duration::from_millis(80));

    let task = orchestrator
        .submit(&cli.input, &filename, options)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    bar.finish_and_clear();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    match task.status {
        TaskStatus::Completed => {
            let result = task.result.as_ref().expect("completed task has a result");
            println!(
                "✓ {} — {} page(s), {} region(s), {}ms",
                task.id,
                result.total_pages,
                result.regions.len(),
                task.duration_ms.unwrap_or(0)
            );
            if let Some(artifacts) = &task.artifacts {
                println!("  markdown: {}", artifacts.markdown_url);
                println!("  regions:  {}", artifacts.regions_url);
            }
        }
        TaskStatus::Failed => {
            let err = task.error.as_ref().expect("failed task has an error");
            eprintln!("✗ {} — {:?}: {}", task.id, err.kind, err.message);
            std::process::exit(1);
        }
        other => {
            // submit() only returns terminal tasks.
            eprintln!("✗ {} — unexpected non-terminal status {other:?}", task.id);
            std::process::exit(1);
        }
    }

    Ok(())
}
