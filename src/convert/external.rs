//! External-tool conversion: headless LibreOffice out-of-process.
//!
//! Invocation contract: the tool is run with a hard timeout; a non-zero
//! exit status or a missing expected output file is a conversion failure
//! carrying the captured diagnostic output, and success requires the
//! `{stem}.pdf` to actually exist in the output directory (LibreOffice has
//! been known to exit 0 without producing anything).

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Well-known tool locations, probed in order at startup.
const TOOL_CANDIDATES: &[&str] = &[
    "soffice",
    "libreoffice",
    "/usr/bin/soffice",
    "/usr/bin/libreoffice",
    "/usr/local/bin/soffice",
    "/opt/libreoffice/program/soffice",
];

/// Locate a working LibreOffice binary, if any.
///
/// Runs `--version` against each candidate; the first one that exits
/// successfully wins. Called exactly once, at converter construction.
pub fn probe_tool() -> Option<PathBuf> {
    for candidate in TOOL_CANDIDATES {
        let ok = std::process::Command::new(candidate)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if ok {
            info!("Found conversion tool at: {candidate}");
            return Some(PathBuf::from(candidate));
        }
    }
    None
}

/// Convert `doc_path` to `{out_dir}/{stem}.pdf` via the external tool.
pub async fn convert(
    tool: &Path,
    doc_path: &Path,
    out_dir: &Path,
    timeout_secs: u64,
) -> Result<PathBuf, PipelineError> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| PipelineError::ArtifactWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    debug!(
        "Running {} --headless --convert-to pdf --outdir {} {}",
        tool.display(),
        out_dir.display(),
        doc_path.display()
    );

    // kill_on_drop reaps the child if the task is cancelled or the timeout
    // below fires; best-effort, never orphaned.
    let child = Command::new(tool)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(out_dir)
        .arg(doc_path)
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(PipelineError::ConversionFailed {
                detail: format!("failed to spawn '{}': {e}", tool.display()),
            })
        }
        Err(_) => {
            return Err(PipelineError::ConversionFailed {
                detail: format!(
                    "conversion tool exceeded the {timeout_secs}s timeout and was killed"
                ),
            })
        }
    };

    if !output.status.success() {
        return Err(PipelineError::ConversionFailed {
            detail: format!(
                "conversion tool exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let pdf_path = out_dir.join(expected_pdf_name(doc_path));
    if !pdf_path.exists() {
        return Err(PipelineError::ConversionFailed {
            detail: format!(
                "tool exited successfully but produced no PDF at '{}'",
                pdf_path.display()
            ),
        });
    }

    info!("Converted '{}' → '{}'", doc_path.display(), pdf_path.display());
    Ok(pdf_path)
}

/// The deterministic output filename the tool derives from its input.
fn expected_pdf_name(doc_path: &Path) -> String {
    let stem = doc_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    format!("{stem}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_pdf_name_from_stem() {
        assert_eq!(expected_pdf_name(Path::new("/tmp/memo.docx")), "memo.pdf");
        assert_eq!(expected_pdf_name(Path::new("report.doc")), "report.pdf");
    }

    #[tokio::test]
    async fn failing_tool_is_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("memo.docx");
        std::fs::write(&doc, b"not a real docx").unwrap();

        let err = convert(Path::new("/bin/false"), &doc, dir.path(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConversionFailed { .. }));
    }

    #[tokio::test]
    async fn missing_tool_is_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("memo.docx");
        std::fs::write(&doc, b"x").unwrap();

        let err = convert(
            Path::new("/nonexistent/soffice-binary"),
            &doc,
            dir.path(),
            5,
        )
        .await
        .unwrap_err();
        match err {
            PipelineError::ConversionFailed { detail } => {
                assert!(detail.contains("spawn"), "got: {detail}");
            }
            other => panic!("expected ConversionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_exiting_zero_without_output_is_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("memo.docx");
        std::fs::write(&doc, b"x").unwrap();

        // /bin/true accepts any arguments, exits 0, writes nothing.
        let err = convert(Path::new("/bin/true"), &doc, dir.path(), 5)
            .await
            .unwrap_err();
        match err {
            PipelineError::ConversionFailed { detail } => {
                assert!(detail.contains("no PDF"), "got: {detail}");
            }
            other => panic!("expected ConversionFailed, got {other:?}"),
        }
    }
}
