//! # pagemill
//!
//! Normalize an arbitrary uploaded document — image, PDF, or word-processor
//! file — into an ordered set of rasterized page images, hand each page to
//! an external OCR/layout engine, and reassemble the per-page output into
//! one structured task response.
//!
//! This crate is the ingestion/conversion pipeline and the task-lifecycle
//! orchestrator that sits in front of the engine. The engine itself, the
//! HTTP transport, and static-file serving of result artifacts are external
//! collaborators.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ classify   extension → MIME fallback → DocumentKind
//!  ├─ convert    doc/docx → PDF  (external tool, or lossy in-process fallback)
//!  ├─ rasterize  PDF → ordered page PNGs via pdfium (spawn_blocking)
//!  ├─ recognize  one OCR engine call per page, sequential, with deadline
//!  └─ aggregate  page texts + layout regions → one AggregatedResult
//! ```
//!
//! The task state machine is linear — `Pending → Converting → Extracting →
//! Completed`, with an escape edge to `Failed` from any non-terminal state.
//! Page order is established at rasterization and preserved through every
//! later stage; it is the single most important invariant for the
//! correctness of the aggregated result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagemill::{PipelineConfig, RemoteEngine, SubmitOptions, TaskOrchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(RemoteEngine::new("http://127.0.0.1:8000")?);
//!     let orchestrator = TaskOrchestrator::new(engine, PipelineConfig::default())?;
//!
//!     let task = orchestrator
//!         .submit("scan.pdf".as_ref(), "scan.pdf", SubmitOptions::default())
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&task)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! A failed task is a normal response: pipeline errors are recorded on the
//! task (`status: failed`, structured error kind + message), never bubbled
//! as `Err`. Only caller-input errors — unsupported file type, malformed
//! request — are returned as `Err`, before any task is created. Nothing is
//! retried automatically.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod classify;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod orchestrate;
pub mod output;
pub mod prompts;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use classify::DocumentKind;
pub use config::{BoundingBox, PageSeparator, PipelineConfig, PipelineConfigBuilder, PromptMode};
pub use engine::{OcrEngine, PageRecognition, PageRequest, RemoteEngine};
pub use error::{ErrorKind, PipelineError, TaskError};
pub use orchestrate::TaskOrchestrator;
pub use output::{aggregate, AggregatedResult, LayoutRegion, PageResult, ResultArtifacts};
pub use task::{CancelToken, SubmitOptions, Task, TaskId, TaskStatus};
