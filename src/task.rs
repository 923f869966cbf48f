//! Task records and the processing state machine.
//!
//! A [`Task`] is created by the orchestrator on submission and mutated by
//! nothing else. Status moves strictly forward along
//! `Pending → Converting → Extracting → Completed`, with a single escape
//! edge from any non-terminal state to `Failed`; `Completed` and `Failed`
//! are terminal and freeze the record.

use crate::classify::DocumentKind;
use crate::config::{BoundingBox, PromptMode};
use crate::error::{PipelineError, TaskError};
use crate::output::{AggregatedResult, ResultArtifacts};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Unique task identity (UUID v4), collision-free for practical purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn generate() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Linear processing status. No cycles, no re-entry into a prior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Converting,
    Extracting,
    Completed,
    Failed,
}

impl TaskStatus {
    /// True for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `next` is a legal forward transition from `self`.
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            // Escape edge: any non-terminal state may fail.
            TaskStatus::Failed => true,
            TaskStatus::Converting => *self == TaskStatus::Pending,
            TaskStatus::Extracting => *self == TaskStatus::Converting,
            TaskStatus::Completed => *self == TaskStatus::Extracting,
            TaskStatus::Pending => false,
        }
    }
}

/// Caller-supplied processing options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitOptions {
    pub mode: PromptMode,
    /// Contrast/re-encode pass for image inputs.
    pub preprocess: bool,
    /// Target box for grounded OCR; mandatory in that mode.
    pub bbox: Option<BoundingBox>,
}

impl SubmitOptions {
    /// Reject malformed submissions before any task exists.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.mode.requires_bbox() && self.bbox.is_none() {
            return Err(PipelineError::InvalidRequest(
                "grounded OCR mode requires a bounding box".into(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, checked at stage boundaries.
///
/// Cloning shares the flag. Cancellation mid-external-process is
/// best-effort (the child is killed, not orphaned) and surfaces as a
/// `Cancelled` failure, never as `Completed`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set; used with `?` at each stage
    /// boundary.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One processing task, from submission to its terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: DocumentKind,
    pub original_filename: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Set when the task reaches `Completed` or `Failed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock processing duration, set at the terminal transition.
    pub duration_ms: Option<u64>,
    /// Set only on `Failed` tasks.
    pub error: Option<TaskError>,
    /// Set only on `Completed` tasks.
    pub result: Option<AggregatedResult>,
    /// Locators for persisted artifacts; set only on `Completed` tasks.
    pub artifacts: Option<ResultArtifacts>,
}

impl Task {
    /// Create a fresh `Pending` task.
    pub fn new(kind: DocumentKind, original_filename: &str) -> Self {
        Task {
            id: TaskId::generate(),
            kind,
            original_filename: original_filename.to_string(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error: None,
            result: None,
            artifacts: None,
        }
    }

    /// Move to the next non-terminal stage.
    ///
    /// An illegal transition is an orchestrator defect and surfaces as an
    /// internal error rather than silently corrupting the record.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), PipelineError> {
        if !self.status.can_advance_to(next) {
            return Err(PipelineError::Internal(format!(
                "illegal status transition {:?} → {:?} for task {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Terminal success: record result, artifacts, and timing.
    ///
    /// Completing from any state other than `Extracting` is an orchestrator
    /// defect and is rejected the same way as [`advance`](Self::advance).
    pub fn complete(
        &mut self,
        result: AggregatedResult,
        artifacts: ResultArtifacts,
    ) -> Result<(), PipelineError> {
        if !self.status.can_advance_to(TaskStatus::Completed) {
            return Err(PipelineError::Internal(format!(
                "illegal status transition {:?} → {:?} for task {}",
                self.status,
                TaskStatus::Completed,
                self.id
            )));
        }
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.artifacts = Some(artifacts);
        self.finish_clock();
        Ok(())
    }

    /// Terminal failure: record the structured error and timing. No result
    /// is ever attached to a failed task.
    pub fn fail(&mut self, err: &PipelineError) {
        self.status = TaskStatus::Failed;
        self.error = Some(TaskError::from(err));
        self.finish_clock();
    }

    fn finish_clock(&mut self) {
        let now = Utc::now();
        self.duration_ms = Some(
            (now - self.created_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.completed_at = Some(now);
    }
}
