//! PDF rasterization: every page → one PNG on disk, in page order.
//!
//! pdfium wraps thread-local C++ state and is not async-safe, so all
//! rendering happens inside `tokio::task::spawn_blocking`.
//!
//! Output files are named `{stem}_page_{n}.png` with n 1-indexed and
//! monotonically increasing with no gaps; the returned path order IS the
//! page order consumed by every downstream stage, and nothing later in the
//! pipeline may reorder it.

use crate::error::PipelineError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterize every page of `pdf_path` into `out_dir` at the given DPI.
///
/// # Errors
/// [`PipelineError::RasterizationFailed`] when the PDF cannot be opened or
/// has zero pages; [`PipelineError::ArtifactWriteFailed`] when a page image
/// cannot be written.
pub async fn to_pages(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, PipelineError> {
    let pdf_path = pdf_path.to_path_buf();
    let out_dir = out_dir.to_path_buf();

    tokio::task::spawn_blocking(move || to_pages_blocking(&pdf_path, &out_dir, dpi))
        .await
        .map_err(|e| PipelineError::Internal(format!("Render task panicked: {e}")))?
}

fn to_pages_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, PipelineError> {
    std::fs::create_dir_all(out_dir).map_err(|e| PipelineError::ArtifactWriteFailed {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let pdfium = Pdfium::default();
    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| PipelineError::RasterizationFailed {
                path: pdf_path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

    let pages = document.pages();
    let total = pages.len() as usize;
    if total == 0 {
        return Err(PipelineError::RasterizationFailed {
            path: pdf_path.to_path_buf(),
            detail: "PDF has zero pages".into(),
        });
    }
    info!("Rasterizing {} pages at {} DPI", total, dpi);

    // PDF user space is 72 points per inch.
    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    let stem = pdf_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");

    let mut image_paths = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| PipelineError::RasterizationFailed {
                    path: pdf_path.to_path_buf(),
                    detail: format!("page {page_num}: {e:?}"),
                })?;
        let image = bitmap.as_image();

        let image_path = out_dir.join(page_file_name(stem, page_num));
        image
            .save_with_format(&image_path, image::ImageFormat::Png)
            .map_err(|e| PipelineError::ArtifactWriteFailed {
                path: image_path.clone(),
                source: std::io::Error::other(e),
            })?;

        debug!(
            "Rendered page {} → {} ({}x{} px)",
            page_num,
            image_path.display(),
            image.width(),
            image.height()
        );
        image_paths.push(image_path);
    }

    Ok(image_paths)
}

/// `{stem}_page_{n}.png`, 1-indexed.
pub fn page_file_name(stem: &str, page_num: usize) -> String {
    format!("{stem}_page_{page_num}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_file_names_are_one_indexed_and_gapless() {
        let names: Vec<String> = (1..=3).map(|n| page_file_name("report", n)).collect();
        assert_eq!(
            names,
            vec!["report_page_1.png", "report_page_2.png", "report_page_3.png"]
        );
    }

    #[tokio::test]
    async fn unreadable_pdf_is_rasterization_failed() {
        // Needs a pdfium shared library at runtime.
        if std::env::var("PAGEMILL_E2E").is_err() {
            eprintln!("SKIP — set PAGEMILL_E2E=1 to run pdfium-backed tests");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.pdf");
        std::fs::write(&bogus, b"not a pdf at all").unwrap();

        let err = to_pages(&bogus, dir.path(), 200).await.unwrap_err();
        assert!(matches!(err, PipelineError::RasterizationFailed { .. }));
    }
}
