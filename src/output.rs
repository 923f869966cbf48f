//! Result types and aggregation.
//!
//! [`aggregate`] is a pure, total function over a non-empty, already-ordered
//! page sequence: the orchestrator re-indexes engine output by submission
//! order *before* calling it, and zero rasterized pages is already a
//! rasterization failure one stage earlier, so aggregation never sees an
//! empty input in practice.

use crate::config::PageSeparator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One detected bounding region on a page.
///
/// The category label is a closed vocabulary defined by the OCR engine
/// (e.g. `Text`, `Table`, `Picture`) and is opaque to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRegion {
    /// `[x1, y1, x2, y2]` in page pixel space, `x1 < x2`, `y1 < y2`.
    pub bbox: [f64; 4],
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// OCR output for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page index, contiguous in submission order.
    pub page_num: usize,
    /// Extracted text/markdown for the page.
    pub text: String,
    /// Regions in the engine's reading order for this page.
    pub regions: Vec<LayoutRegion>,
}

/// Document-level result assembled from per-page OCR output.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResult {
    /// Per-page results in page order. Never reordered after aggregation.
    pub pages: Vec<PageResult>,
    /// Page texts joined with the configured separator.
    pub text: String,
    /// All regions across pages, flattened page-then-region order.
    pub regions: Vec<LayoutRegion>,
    pub total_pages: usize,
}

/// Relative URLs of the persisted result artifacts for one task, resolved
/// by clients against the static results root.
#[derive(Debug, Clone, Serialize)]
pub struct ResultArtifacts {
    /// Combined markdown document.
    pub markdown_url: String,
    /// Combined region list (JSON).
    pub regions_url: String,
    /// Per-page markdown files, in page order.
    pub page_urls: Vec<String>,
}

impl ResultArtifacts {
    /// Derive the relative URL for one artifact file of a task.
    pub fn url_for(task_id: &str, file_name: &str) -> String {
        format!("/results/{task_id}/{file_name}")
    }
}

/// Merge ordered page results into one [`AggregatedResult`].
///
/// Pure function: input order is output order, the separator is inserted
/// between consecutive pages (N pages → N−1 separators), and regions are
/// flattened preserving per-page then per-region order.
pub fn aggregate(pages: Vec<PageResult>, separator: &PageSeparator) -> AggregatedResult {
    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push_str(&separator.render(page.page_num));
        }
        text.push_str(page.text.trim_end_matches('\n'));
    }

    let regions: Vec<LayoutRegion> = pages
        .iter()
        .flat_map(|p| p.regions.iter().cloned())
        .collect();

    let total_pages = pages.len();

    AggregatedResult {
        pages,
        text,
        regions,
        total_pages,
    }
}

// ── Engine-text cleanup ──────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown)?\n(.*)\n```\s*$").unwrap());

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

/// Deterministic cleanup of raw engine text.
///
/// Engines occasionally wrap the whole page in markdown fences or emit
/// CRLF line endings; both are structural noise, not content. Applied per
/// page before aggregation.
pub fn clean_text(input: &str) -> String {
    let s = match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    };
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = RE_BLANK_LINES.replace_all(&s, "\n\n\n").into_owned();
    let trimmed = s.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, text: &str, categories: &[&str]) -> PageResult {
        PageResult {
            page_num: n,
            text: text.to_string(),
            regions: categories
                .iter()
                .map(|c| LayoutRegion {
                    bbox: [0.0, 0.0, 10.0, 10.0],
                    category: c.to_string(),
                    text: None,
                })
                .collect(),
        }
    }

    #[test]
    fn aggregate_joins_with_separator() {
        let result = aggregate(
            vec![page(1, "one\n", &[]), page(2, "two\n", &[]), page(3, "three\n", &[])],
            &PageSeparator::HorizontalRule,
        );
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.text, "one\n\n---\n\ntwo\n\n---\n\nthree");
        assert_eq!(result.text.matches("\n\n---\n\n").count(), 2);
    }

    #[test]
    fn aggregate_preserves_page_order() {
        let result = aggregate(
            vec![page(1, "a", &[]), page(2, "b", &[]), page(3, "c", &[])],
            &PageSeparator::BlankLine,
        );
        let nums: Vec<usize> = result.pages.iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
    }

    #[test]
    fn aggregate_flattens_regions_in_page_then_region_order() {
        let result = aggregate(
            vec![
                page(1, "a", &["Title", "Text"]),
                page(2, "b", &["Table"]),
            ],
            &PageSeparator::BlankLine,
        );
        let cats: Vec<&str> = result.regions.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(cats, vec!["Title", "Text", "Table"]);
    }

    #[test]
    fn single_page_has_no_separator() {
        let result = aggregate(vec![page(1, "only\n", &[])], &PageSeparator::HorizontalRule);
        assert_eq!(result.text, "only");
        assert_eq!(result.total_pages, 1);
    }

    #[test]
    fn clean_text_strips_outer_fences() {
        assert_eq!(clean_text("```markdown\n# Title\n```"), "# Title\n");
        assert_eq!(clean_text("```\nbody\n```"), "body\n");
    }

    #[test]
    fn clean_text_normalizes_line_endings() {
        assert_eq!(clean_text("a\r\nb\rc"), "a\nb\nc\n");
    }

    #[test]
    fn clean_text_collapses_blank_runs_and_adds_final_newline() {
        let cleaned = clean_text("a\n\n\n\n\n\nb");
        assert!(!cleaned.contains("\n\n\n\n"));
        assert!(cleaned.ends_with("b\n"));
    }

    #[test]
    fn clean_text_empty_stays_empty() {
        assert_eq!(clean_text("   \n"), "");
    }

    #[test]
    fn artifact_url_shape() {
        assert_eq!(
            ResultArtifacts::url_for("abc-123", "report.md"),
            "/results/abc-123/report.md"
        );
    }
}
