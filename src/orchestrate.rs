//! Task orchestration: the only component with mutable task state.
//!
//! [`TaskOrchestrator::submit`] drives one task through
//! classification → conversion → rasterization → OCR → aggregation and
//! returns only after the task reaches a terminal state. Every stage error
//! is caught at the stage boundary and becomes a terminal `Failed` task —
//! a normal, successfully returned response. Only caller-input errors
//! (unsupported type, malformed request) are returned as `Err`, before any
//! task exists.
//!
//! Concurrency model: one `submit` call per task; callers spawn submits
//! concurrently and the orchestrator shares no mutable state between them.
//! Within a task, stages are strictly sequential — each stage's output is
//! the next stage's required input.

use crate::classify::{self, DocumentKind};
use crate::config::PipelineConfig;
use crate::convert::{preprocess, raster, DocToPdf};
use crate::engine::{OcrEngine, PageRequest};
use crate::error::PipelineError;
use crate::output::{self, AggregatedResult, PageResult, ResultArtifacts};
use crate::task::{CancelToken, SubmitOptions, Task, TaskStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Drives submitted documents through the processing pipeline.
pub struct TaskOrchestrator {
    engine: Arc<dyn OcrEngine>,
    converter: DocToPdf,
    config: PipelineConfig,
}

impl TaskOrchestrator {
    /// Build an orchestrator around an injected OCR engine.
    ///
    /// Creates the results root and fixes the doc-to-PDF strategy once;
    /// there is no tool re-probing per call.
    pub fn new(engine: Arc<dyn OcrEngine>, config: PipelineConfig) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(&config.results_dir).map_err(|e| {
            PipelineError::ArtifactWriteFailed {
                path: config.results_dir.clone(),
                source: e,
            }
        })?;
        let converter = DocToPdf::detect(&config);
        Ok(Self {
            engine,
            converter,
            config,
        })
    }

    /// Process one uploaded document to a terminal [`Task`].
    ///
    /// # Errors
    /// `Err` only for caller-input problems rejected before a task is
    /// created: [`PipelineError::UnsupportedType`] and
    /// [`PipelineError::InvalidRequest`]. Pipeline failures are reported
    /// through the returned task's `Failed` state instead.
    pub async fn submit(
        &self,
        file_path: &Path,
        filename: &str,
        options: SubmitOptions,
    ) -> Result<Task, PipelineError> {
        self.submit_with_cancel(file_path, filename, options, CancelToken::new())
            .await
    }

    /// [`submit`](Self::submit) with cooperative cancellation, checked at
    /// each stage boundary.
    pub async fn submit_with_cancel(
        &self,
        file_path: &Path,
        filename: &str,
        options: SubmitOptions,
        cancel: CancelToken,
    ) -> Result<Task, PipelineError> {
        // ── Pre-flight: caller errors never create a task ────────────────
        options.validate()?;
        self.check_upload_size(file_path).await?;
        let kind = classify::classify(file_path, filename)?;

        let mut task = Task::new(kind, filename);
        let task_dir = self.config.results_dir.join(task.id.to_string());
        info!("[{}] Submitted '{}' as {:?}", task.id, filename, kind);

        match self
            .run_pipeline(&mut task, file_path, filename, kind, options, &cancel, &task_dir)
            .await
        {
            Ok((result, artifacts)) => match task.complete(result, artifacts) {
                Ok(()) => info!(
                    "[{}] Completed: {} pages in {}ms",
                    task.id,
                    task.result.as_ref().map(|r| r.total_pages).unwrap_or(0),
                    task.duration_ms.unwrap_or(0)
                ),
                Err(err) => {
                    warn!("[{}] {}", task.id, err);
                    task.fail(&err);
                }
            },
            Err(err) => {
                warn!("[{}] Failed at {:?}: {}", task.id, task.status, err);
                task.fail(&err);
            }
        }

        Ok(task)
    }

    /// All fallible stages; any error here fails the task.
    #[allow(clippy::too_many_arguments)]
    async fn run_pipeline(
        &self,
        task: &mut Task,
        file_path: &Path,
        filename: &str,
        kind: DocumentKind,
        options: SubmitOptions,
        cancel: &CancelToken,
        task_dir: &Path,
    ) -> Result<(AggregatedResult, ResultArtifacts), PipelineError> {
        tokio::fs::create_dir_all(task_dir)
            .await
            .map_err(|e| PipelineError::ArtifactWriteFailed {
                path: task_dir.to_path_buf(),
                source: e,
            })?;

        // ── Pending → Converting ─────────────────────────────────────────
        cancel.check()?;
        task.advance(TaskStatus::Converting)?;

        let (process_path, kind) = match kind {
            DocumentKind::LegacyDoc | DocumentKind::ModernDoc => {
                info!("[{}] Converting {:?} to PDF", task.id, kind);
                let pdf = self.converter.to_pdf(file_path, kind, task_dir).await?;
                // The converted artifact is a PDF from here on.
                (pdf, DocumentKind::Pdf)
            }
            _ => (file_path.to_path_buf(), kind),
        };

        // ── Converting → Extracting ──────────────────────────────────────
        cancel.check()?;
        task.advance(TaskStatus::Extracting)?;

        let page_images: Vec<PathBuf> = match kind {
            DocumentKind::Pdf => {
                raster::to_pages(&process_path, task_dir, self.config.dpi).await?
            }
            DocumentKind::Image => {
                vec![
                    preprocess::prepare_image(
                        &process_path,
                        filename,
                        task_dir,
                        options.preprocess,
                    )
                    .await?,
                ]
            }
            // Unreachable: doc kinds were normalized to PDF above.
            _ => {
                return Err(PipelineError::Internal(format!(
                    "unconverted document kind {kind:?} reached extraction"
                )))
            }
        };
        info!("[{}] {} page(s) to extract", task.id, page_images.len());

        // ── Extracting → Completed ───────────────────────────────────────
        self.engine.ensure_ready().await?;

        let deadline = Duration::from_secs(self.config.engine_timeout_secs);
        let mut recognized = Vec::with_capacity(page_images.len());
        for (idx, image_path) in page_images.iter().enumerate() {
            cancel.check()?;
            let page_num = idx + 1;
            let request = PageRequest {
                image_path,
                page_num,
                mode: options.mode,
                bbox: options.bbox,
            };
            // Any per-page failure fails the whole task: all-or-nothing,
            // so a Completed task always covers every submitted page.
            let recognition = tokio::time::timeout(deadline, self.engine.recognize(request))
                .await
                .map_err(|_| PipelineError::EngineTimeout {
                    page: page_num,
                    secs: self.config.engine_timeout_secs,
                })??;
            recognized.push(recognition);
        }

        let pages = reindex_pages(recognized);
        let result = output::aggregate(pages, &self.config.page_separator);
        let artifacts = write_artifacts(task, filename, &result, task_dir).await?;

        Ok((result, artifacts))
    }

    async fn check_upload_size(&self, file_path: &Path) -> Result<(), PipelineError> {
        let meta = tokio::fs::metadata(file_path)
            .await
            .map_err(|e| PipelineError::InvalidRequest(format!(
                "cannot read upload '{}': {e}",
                file_path.display()
            )))?;
        if meta.len() > self.config.max_upload_bytes {
            return Err(PipelineError::InvalidRequest(format!(
                "upload is {} bytes, exceeding the {}-byte limit",
                meta.len(),
                self.config.max_upload_bytes
            )));
        }
        Ok(())
    }
}

/// Re-index engine output by submission order.
///
/// The engine echoes page numbers, but they are validated against — never
/// trusted for — ordering: the sequence the orchestrator submitted is the
/// page order, full stop. A mismatch is logged and overwritten.
pub(crate) fn reindex_pages(
    recognized: Vec<crate::engine::PageRecognition>,
) -> Vec<PageResult> {
    recognized
        .into_iter()
        .enumerate()
        .map(|(idx, rec)| {
            let page_num = idx + 1;
            if rec.page_num != page_num {
                warn!(
                    "Engine reported page {} for submission-order page {}; re-indexed",
                    rec.page_num, page_num
                );
            }
            PageResult {
                page_num,
                text: output::clean_text(&rec.text),
                regions: rec.regions,
            }
        })
        .collect()
}

/// Persist result artifacts into the task directory and derive locators.
async fn write_artifacts(
    task: &Task,
    filename: &str,
    result: &AggregatedResult,
    task_dir: &Path,
) -> Result<ResultArtifacts, PipelineError> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let task_id = task.id.to_string();

    let write = |name: String, bytes: Vec<u8>| {
        let path = task_dir.join(&name);
        async move {
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|e| PipelineError::ArtifactWriteFailed { path, source: e })
        }
    };

    let md_name = format!("{stem}.md");
    write(md_name.clone(), result.text.clone().into_bytes()).await?;

    let json_name = format!("{stem}.json");
    let regions_json = serde_json::to_vec_pretty(&result.regions)
        .map_err(|e| PipelineError::Internal(format!("region serialization: {e}")))?;
    write(json_name.clone(), regions_json).await?;

    let mut page_urls = Vec::with_capacity(result.pages.len());
    for page in &result.pages {
        let page_name = format!("{stem}_page_{}.md", page.page_num);
        write(page_name.clone(), page.text.clone().into_bytes()).await?;
        page_urls.push(ResultArtifacts::url_for(&task_id, &page_name));
    }

    Ok(ResultArtifacts {
        markdown_url: ResultArtifacts::url_for(&task_id, &md_name),
        regions_url: ResultArtifacts::url_for(&task_id, &json_name),
        page_urls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PageRecognition;

    fn rec(page_num: usize, text: &str) -> PageRecognition {
        PageRecognition {
            page_num,
            text: text.to_string(),
            regions: vec![],
        }
    }

    #[test]
    fn reindex_overrides_engine_reported_order() {
        let pages = reindex_pages(vec![rec(7, "first"), rec(2, "second"), rec(999, "third")]);
        let nums: Vec<usize> = pages.iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert_eq!(pages[0].text, "first\n");
        assert_eq!(pages[2].text, "third\n");
    }

    #[test]
    fn reindex_cleans_page_text() {
        let pages = reindex_pages(vec![rec(1, "```markdown\n# Title\n```")]);
        assert_eq!(pages[0].text, "# Title\n");
    }
}
