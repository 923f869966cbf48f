//! Pipeline configuration.
//!
//! All knobs live in one [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Keeping every setting in one struct makes it
//! trivial to share a config across concurrently submitted tasks and to log
//! the exact configuration a task ran under.
//!
//! The closed enums accepted at submission time — [`PromptMode`] and the
//! validated [`BoundingBox`] — also live here so the whole request surface
//! is defined in one place.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration shared by every task an orchestrator processes.
///
/// # Example
/// ```rust
/// use pagemill::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(200)
///     .results_dir("/var/lib/pagemill/results")
///     .engine_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rasterization DPI for PDF pages. Range: 72–400. Default: 200.
    ///
    /// 200 DPI keeps small print legible for the layout engine while a
    /// US-letter page stays around 1700×2200 px.
    pub dpi: u32,

    /// Root directory under which each task gets its own working directory
    /// (`{results_dir}/{task_id}`). Default: `./results`.
    ///
    /// Result artifacts are exposed to clients as relative URLs under
    /// `/results/`, resolved by an external static-file server against this
    /// root.
    pub results_dir: PathBuf,

    /// Hard timeout for an external document-conversion tool run, in
    /// seconds. Default: 60.
    pub convert_timeout_secs: u64,

    /// Per-page OCR engine deadline in seconds. Default: 120.
    ///
    /// Expiry surfaces as [`PipelineError::EngineTimeout`] and fails the
    /// task; it is never retried here.
    pub engine_timeout_secs: u64,

    /// Separator inserted between pages in the aggregated text.
    /// Default: horizontal rule.
    pub page_separator: PageSeparator,

    /// Explicit path to the external conversion tool (LibreOffice
    /// `soffice`). If `None`, well-known locations are probed once at
    /// orchestrator construction.
    pub soffice_path: Option<PathBuf>,

    /// Skip external-tool probing entirely and always use the in-process
    /// text-only fallback converter. Default: false.
    pub force_fallback: bool,

    /// Maximum accepted upload size in bytes. Default: 50 MiB.
    /// Oversize submissions are rejected before a task is created.
    pub max_upload_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            results_dir: PathBuf::from("./results"),
            convert_timeout_secs: 60,
            engine_timeout_secs: 120,
            page_separator: PageSeparator::default(),
            soffice_path: None,
            force_fallback: false,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    pub fn convert_timeout_secs(mut self, secs: u64) -> Self {
        self.config.convert_timeout_secs = secs;
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = Some(path.into());
        self
    }

    pub fn force_fallback(mut self, v: bool) -> Self {
        self.config.force_fallback = v;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(PipelineError::Internal(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.convert_timeout_secs == 0 || c.engine_timeout_secs == 0 {
            return Err(PipelineError::Internal(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// OCR prompt mode, a closed set matching the engine's prompt vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptMode {
    /// Full layout detection plus text for every region. (default)
    #[default]
    FullLayout,
    /// Layout regions only, no text extraction.
    LayoutOnly,
    /// Plain text extraction, no layout regions.
    TextOnly,
    /// OCR constrained to a caller-supplied bounding box.
    /// Submissions in this mode must carry a valid [`BoundingBox`].
    GroundedWithBox,
}

impl PromptMode {
    /// True when this mode requires a bounding box on the submission.
    pub fn requires_bbox(&self) -> bool {
        matches!(self, PromptMode::GroundedWithBox)
    }
}

/// A bounding box in page pixel space, `[x1, y1, x2, y2]` with `x1 < x2`
/// and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Construct a validated bounding box.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self, PipelineError> {
        if x1 >= x2 || y1 >= y2 {
            return Err(PipelineError::InvalidRequest(format!(
                "Malformed bounding box [{x1}, {y1}, {x2}, {y2}]: requires x1 < x2 and y1 < y2"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// The box as the `[x1, y1, x2, y2]` array used on the wire.
    pub fn as_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// How to separate pages in the aggregated text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Horizontal rule: `"\n\n---\n\n"`. (default)
    #[default]
    HorizontalRule,
    /// Plain blank line: `"\n\n"`.
    BlankLine,
    /// HTML comment with the page number: `"<!-- page N -->"`.
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator preceding the given page (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::BlankLine => "\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = PipelineConfig::builder().build().unwrap();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.convert_timeout_secs, 60);
        assert!(!c.force_fallback);
    }

    #[test]
    fn builder_rejects_out_of_range_dpi() {
        assert!(PipelineConfig::builder().dpi(50).build().is_err());
        assert!(PipelineConfig::builder().dpi(500).build().is_err());
        assert!(PipelineConfig::builder().dpi(72).build().is_ok());
    }

    #[test]
    fn builder_rejects_zero_timeouts() {
        assert!(PipelineConfig::builder()
            .engine_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn bounding_box_validation() {
        assert!(BoundingBox::new(0, 0, 100, 50).is_ok());
        assert!(BoundingBox::new(100, 0, 100, 50).is_err()); // x1 == x2
        assert!(BoundingBox::new(0, 60, 100, 50).is_err()); // y1 > y2
    }

    #[test]
    fn grounded_mode_requires_bbox() {
        assert!(PromptMode::GroundedWithBox.requires_bbox());
        assert!(!PromptMode::FullLayout.requires_bbox());
    }

    #[test]
    fn separator_render() {
        assert_eq!(PageSeparator::HorizontalRule.render(2), "\n\n---\n\n");
        assert_eq!(PageSeparator::Comment.render(3), "\n\n<!-- page 3 -->\n\n");
        assert_eq!(
            PageSeparator::Custom("***".into()).render(1),
            "\n\n***\n\n"
        );
    }

    #[test]
    fn prompt_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&PromptMode::GroundedWithBox).unwrap();
        assert_eq!(json, "\"grounded-with-box\"");
    }
}
