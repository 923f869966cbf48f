//! OCR engine boundary.
//!
//! The inference engine is an external collaborator: given a page image and
//! a prompt mode it returns text plus layout regions. This crate only
//! prepares its inputs and interprets its outputs, so the seam is a trait
//! object injected into the orchestrator at construction — no global
//! lazily-initialised engine handle. Readiness is an explicit
//! [`OcrEngine::ensure_ready`] call with its own error channel.
//!
//! If the engine enforces a concurrency limit, that is its own admission
//! control; this crate observes it only as latency or an explicit error.

pub mod remote;

use crate::config::{BoundingBox, PromptMode};
use crate::error::PipelineError;
use crate::output::LayoutRegion;
use async_trait::async_trait;
use std::path::Path;

pub use remote::RemoteEngine;

/// One page handed to the engine.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// Rasterized page image on disk.
    pub image_path: &'a Path,
    /// 1-based submission-order page number. Echoed back in the result for
    /// logging; the orchestrator never trusts it for ordering.
    pub page_num: usize,
    pub mode: PromptMode,
    /// Required when `mode` is [`PromptMode::GroundedWithBox`]; validated
    /// before the pipeline starts.
    pub bbox: Option<BoundingBox>,
}

/// Engine output for one page.
#[derive(Debug, Clone)]
pub struct PageRecognition {
    /// Page number as reported by the engine.
    pub page_num: usize,
    pub text: String,
    pub regions: Vec<LayoutRegion>,
}

/// An OCR/layout inference engine.
///
/// Implementations must be `Send + Sync`: multiple tasks call the shared
/// engine concurrently, one sequential call per page within each task.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Make the engine ready to serve (load weights, check the remote
    /// endpoint). Called once per task before the first page; must be
    /// idempotent.
    async fn ensure_ready(&self) -> Result<(), PipelineError>;

    /// Recognize a single page.
    async fn recognize(&self, req: PageRequest<'_>) -> Result<PageRecognition, PipelineError>;
}
