//! File-type classification: map an upload to a closed [`DocumentKind`].
//!
//! Extension wins over MIME. Uploaded filenames are the strongest signal we
//! have (browsers preserve them), while MIME types arrive mangled often
//! enough — `application/octet-stream` for everything is a classic — that
//! the probe is only a fallback for extension-less or oddly named files.

use crate::error::PipelineError;
use std::path::Path;

/// Closed classification of an input file's format.
///
/// Determined once at submission; immutable afterwards (the orchestrator
/// reclassifies converted *artifacts*, never the original upload record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Image,
    Pdf,
    /// Binary `.doc` (OLE container).
    LegacyDoc,
    /// `.docx` (OOXML zip container).
    ModernDoc,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

const LEGACY_DOC_MIME: &str = "application/msword";
const MODERN_DOC_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Classify a file by extension, falling back to a MIME probe of the
/// declared filename. First match wins.
///
/// `path` is the stored upload on disk (its extension may be synthetic);
/// `declared_filename` is what the client called the file and is preferred
/// for both signals.
///
/// # Errors
/// [`PipelineError::UnsupportedType`] when neither signal resolves,
/// carrying the extension and MIME for diagnostics.
pub fn classify(path: &Path, declared_filename: &str) -> Result<DocumentKind, PipelineError> {
    let ext = extension_of(declared_filename)
        .or_else(|| path.extension().and_then(|e| e.to_str()).map(str::to_lowercase))
        .unwrap_or_default();

    // 1) Extension map
    match ext.as_str() {
        e if IMAGE_EXTENSIONS.contains(&e) => return Ok(DocumentKind::Image),
        "pdf" => return Ok(DocumentKind::Pdf),
        "docx" => return Ok(DocumentKind::ModernDoc),
        "doc" => return Ok(DocumentKind::LegacyDoc),
        _ => {}
    }

    // 2) MIME fallback
    let mime = mime_guess::from_path(declared_filename)
        .first()
        .map(|m| m.essence_str().to_string());

    if let Some(ref m) = mime {
        if m.starts_with("image/") {
            return Ok(DocumentKind::Image);
        }
        if m == "application/pdf" {
            return Ok(DocumentKind::Pdf);
        }
        if m == MODERN_DOC_MIME {
            return Ok(DocumentKind::ModernDoc);
        }
        if m == LEGACY_DOC_MIME {
            // The legacy MIME is ambiguous between the two doc kinds;
            // disambiguate by extension.
            return Ok(if ext == "docx" {
                DocumentKind::ModernDoc
            } else {
                DocumentKind::LegacyDoc
            });
        }
    }

    Err(PipelineError::UnsupportedType {
        extension: if ext.is_empty() {
            String::new()
        } else {
            format!(".{ext}")
        },
        mime,
    })
}

/// Lower-cased extension of a filename, if any.
fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn classify_name(name: &str) -> Result<DocumentKind, PipelineError> {
        classify(&PathBuf::from(format!("/tmp/upload/{name}")), name)
    }

    #[test]
    fn all_image_extensions_classify_as_image() {
        for ext in IMAGE_EXTENSIONS {
            assert_eq!(
                classify_name(&format!("scan.{ext}")).unwrap(),
                DocumentKind::Image,
                "extension {ext}"
            );
        }
    }

    #[test]
    fn document_extensions() {
        assert_eq!(classify_name("report.pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(classify_name("memo.docx").unwrap(), DocumentKind::ModernDoc);
        assert_eq!(classify_name("memo.doc").unwrap(), DocumentKind::LegacyDoc);
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(classify_name("SCAN.PNG").unwrap(), DocumentKind::Image);
        assert_eq!(classify_name("Report.PDF").unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn declared_filename_wins_over_stored_path() {
        // Uploads are often stored under an opaque name; the declared
        // filename carries the real extension.
        let stored = PathBuf::from("/tmp/upload/3aa81c");
        assert_eq!(
            classify(&stored, "invoice.pdf").unwrap(),
            DocumentKind::Pdf
        );
    }

    #[test]
    fn unknown_extension_fails_with_diagnostics() {
        let err = classify_name("archive.xyz").unwrap_err();
        match err {
            PipelineError::UnsupportedType { extension, .. } => {
                assert_eq!(extension, ".xyz");
            }
            other => panic!("expected UnsupportedType, got {other:?}"),
        }
    }

    #[test]
    fn no_extension_no_mime_fails() {
        let err = classify_name("README").unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedType { .. }));
    }
}
