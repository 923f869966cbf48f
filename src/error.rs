//! Error types for the pagemill pipeline.
//!
//! Two tiers of failure exist, and the split matters:
//!
//! * **Caller errors** — [`PipelineError::UnsupportedType`] and
//!   [`PipelineError::InvalidRequest`] are rejected by
//!   [`crate::orchestrate::TaskOrchestrator::submit`] *before* a task is
//!   created. They never enter the state machine and leave no artifacts
//!   behind.
//!
//! * **Pipeline errors** — everything else is caught at a stage boundary and
//!   recorded on the task as a structured [`TaskError`], moving the task to
//!   its terminal `Failed` state. A failed task is a normal response, not a
//!   transport-level crash.
//!
//! Nothing is retried automatically; retry policy belongs to the caller.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the pagemill pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Caller errors (rejected before task creation) ─────────────────────
    /// Neither the filename extension nor the probed MIME type resolved to a
    /// supported document kind.
    #[error("Unsupported file type: extension '{extension}' (MIME: {})", mime.as_deref().unwrap_or("unknown"))]
    UnsupportedType {
        extension: String,
        mime: Option<String>,
    },

    /// The submission itself is malformed (missing or degenerate bounding
    /// box for grounded OCR, oversize upload, …).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Conversion errors ─────────────────────────────────────────────────
    /// Document-to-PDF normalization failed (external tool non-zero exit,
    /// tool timeout, missing expected output, or malformed input in the
    /// in-process fallback).
    #[error("Document conversion failed: {detail}")]
    ConversionFailed { detail: String },

    /// The PDF could not be opened or contains no renderable pages.
    #[error("Rasterization failed for '{path}': {detail}")]
    RasterizationFailed { path: PathBuf, detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The OCR engine returned an error for a page.
    #[error("OCR engine failed on page {page}: {detail}")]
    EngineFailure { page: usize, detail: String },

    /// The per-page OCR deadline expired.
    #[error("OCR engine timed out after {secs}s on page {page}")]
    EngineTimeout { page: usize, secs: u64 },

    // ── Lifecycle ─────────────────────────────────────────────────────────
    /// The task was cancelled cooperatively between stages.
    #[error("Task cancelled")]
    Cancelled,

    // ── Unexpected defects ────────────────────────────────────────────────
    /// Could not write an intermediate or result artifact (disk full,
    /// permissions). Distinct from the modeled failure kinds above.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable classification of a [`PipelineError`], stored on failed
/// tasks and serialized to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedType,
    InvalidRequest,
    ConversionFailed,
    RasterizationFailed,
    EngineFailure,
    EngineTimeout,
    Cancelled,
    ArtifactWriteFailed,
    Internal,
}

impl PipelineError {
    /// The serializable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            PipelineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PipelineError::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            PipelineError::RasterizationFailed { .. } => ErrorKind::RasterizationFailed,
            PipelineError::EngineFailure { .. } => ErrorKind::EngineFailure,
            PipelineError::EngineTimeout { .. } => ErrorKind::EngineTimeout,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::ArtifactWriteFailed { .. } => ErrorKind::ArtifactWriteFailed,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for errors the orchestrator rejects before creating a task.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedType { .. } | PipelineError::InvalidRequest(_)
        )
    }
}

/// Structured error record carried by a failed [`crate::task::Task`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PipelineError> for TaskError {
    fn from(err: &PipelineError) -> Self {
        TaskError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
