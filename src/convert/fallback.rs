//! In-process fallback conversion: docx text → simple PDF.
//!
//! Used when no external conversion tool is available. Explicitly lossy:
//! only paragraph text survives — tables, images, styles, headers and
//! footers do not. The output is deterministic (no timestamps, fixed
//! layout), so converting the same input twice yields identical bytes.
//!
//! Legacy binary `.doc` files have no in-process parser here; they require
//! the external tool and fail with a conversion error otherwise.

use crate::classify::DocumentKind;
use crate::error::PipelineError;
use lopdf::{dictionary, Document, Object, Stream};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

const LINES_PER_PAGE: usize = 50;

/// Convert a modern-doc (docx) to `{out_dir}/{stem}.pdf` in-process.
pub async fn convert(
    doc_path: &Path,
    kind: DocumentKind,
    out_dir: &Path,
) -> Result<PathBuf, PipelineError> {
    if kind == DocumentKind::LegacyDoc {
        return Err(PipelineError::ConversionFailed {
            detail: "legacy .doc input requires the external conversion tool, \
                     which is not available"
                .into(),
        });
    }

    let doc_path = doc_path.to_path_buf();
    let out_dir = out_dir.to_path_buf();
    // zip + lopdf are synchronous; keep them off the async workers.
    tokio::task::spawn_blocking(move || convert_blocking(&doc_path, &out_dir))
        .await
        .map_err(|e| PipelineError::Internal(format!("fallback conversion task panicked: {e}")))?
}

fn convert_blocking(doc_path: &Path, out_dir: &Path) -> Result<PathBuf, PipelineError> {
    let text = extract_docx_text(doc_path)?;

    let stem = doc_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let pdf_path = out_dir.join(format!("{stem}.pdf"));

    std::fs::create_dir_all(out_dir).map_err(|e| PipelineError::ArtifactWriteFailed {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let bytes = text_to_pdf(&text)?;
    std::fs::write(&pdf_path, bytes).map_err(|e| PipelineError::ArtifactWriteFailed {
        path: pdf_path.clone(),
        source: e,
    })?;

    info!(
        "Fallback-converted '{}' → '{}' (text only)",
        doc_path.display(),
        pdf_path.display()
    );
    Ok(pdf_path)
}

/// Pull paragraph text out of the docx zip container.
fn extract_docx_text(doc_path: &Path) -> Result<String, PipelineError> {
    let file = std::fs::File::open(doc_path).map_err(|e| PipelineError::ConversionFailed {
        detail: format!("cannot open '{}': {e}", doc_path.display()),
    })?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| PipelineError::ConversionFailed {
        detail: format!("not a docx container: {e}"),
    })?;

    let mut document_xml =
        archive
            .by_name("word/document.xml")
            .map_err(|e| PipelineError::ConversionFailed {
                detail: format!("docx is missing word/document.xml: {e}"),
            })?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .map_err(|e| PipelineError::ConversionFailed {
            detail: format!("cannot read word/document.xml: {e}"),
        })?;

    parse_docx_xml(&xml)
}

/// Collect the text of `<w:t>` runs, one line per `<w:p>` paragraph.
fn parse_docx_xml(xml: &str) -> Result<String, PipelineError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_run {
                    text.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PipelineError::ConversionFailed {
                    detail: format!("malformed document.xml: {e}"),
                });
            }
            _ => {}
        }
    }

    Ok(text)
}

/// Lay extracted text out into a minimal Helvetica PDF, US-letter pages.
fn text_to_pdf(text: &str) -> Result<Vec<u8>, PipelineError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.new_object_id();
    let resources_id = doc.new_object_id();

    doc.objects.insert(
        font_id,
        Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        }),
    );
    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        }),
    );

    let lines: Vec<&str> = text.lines().collect();
    let page_count = lines.len().div_ceil(LINES_PER_PAGE).max(1);

    let mut page_ids = Vec::with_capacity(page_count);
    for page_num in 0..page_count {
        let start = page_num * LINES_PER_PAGE;
        let end = ((page_num + 1) * LINES_PER_PAGE).min(lines.len());
        let page_lines = if start < lines.len() {
            &lines[start..end]
        } else {
            &[]
        };

        let content_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let content = page_content_stream(page_lines);
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
        );
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            }),
        );
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PipelineError::ConversionFailed {
            detail: format!("PDF synthesis failed: {e}"),
        })?;
    Ok(buffer)
}

fn page_content_stream(lines: &[&str]) -> String {
    let mut content = String::from("BT\n/F1 11 Tf\n50 742 Td\n14 TL\n");
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape_pdf_string(line)));
    }
    content.push_str("ET\n");
    content
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            // Helvetica/WinAnsi cannot represent arbitrary Unicode; the
            // fallback is already documented as lossy.
            _ => " ".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a minimal docx (zip with word/document.xml) on disk.
    fn write_minimal_docx(path: &Path, paragraphs: &[&str]) {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{body}</w:body></w:document>"#
        );

        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn parse_extracts_paragraph_lines() {
        let xml = r#"<w:document xmlns:w="ns"><w:body>
            <w:p><w:r><w:t>First paragraph</w:t></w:r></w:p>
            <w:p><w:r><w:t>Sec</w:t></w:r><w:r><w:t>ond</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = parse_docx_xml(xml).unwrap();
        assert_eq!(text, "First paragraph\nSecond\n");
    }

    #[test]
    fn parse_decodes_run_text() {
        let xml = r#"<w:document xmlns:w="ns"><w:body>
            <w:p><w:r><w:t>café menu</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(parse_docx_xml(xml).unwrap(), "café menu\n");
    }

    #[test]
    fn pdf_escaping() {
        assert_eq!(escape_pdf_string("a(b)c\\d"), "a\\(b\\)c\\\\d");
        assert_eq!(escape_pdf_string("naïve"), "na ve");
    }

    #[test]
    fn empty_text_still_produces_one_page() {
        let bytes = text_to_pdf("").unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn fifty_one_lines_produce_two_pages() {
        let text = (0..51).map(|i| format!("line {i}\n")).collect::<String>();
        let bytes = text_to_pdf(&text).unwrap();
        let s = String::from_utf8_lossy(&bytes);
        assert!(s.contains("/Count 2"), "expected a 2-page PDF");
    }

    #[tokio::test]
    async fn docx_conversion_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let docx = dir.path().join("memo.docx");
        write_minimal_docx(&docx, &["Hello fallback", "Second paragraph"]);

        let first = convert(&docx, DocumentKind::ModernDoc, &dir.path().join("a"))
            .await
            .unwrap();
        let second = convert(&docx, DocumentKind::ModernDoc, &dir.path().join("b"))
            .await
            .unwrap();

        let a = std::fs::read(first).unwrap();
        let b = std::fs::read(second).unwrap();
        assert_eq!(a, b, "same input must produce byte-identical PDFs");
        assert!(a.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn legacy_doc_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("old.doc");
        std::fs::write(&doc, b"\xd0\xcf\x11\xe0 legacy ole").unwrap();

        let err = convert(&doc, DocumentKind::LegacyDoc, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConversionFailed { .. }));
    }

    #[tokio::test]
    async fn garbage_input_is_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("broken.docx");
        std::fs::write(&doc, b"this is not a zip archive").unwrap();

        let err = convert(&doc, DocumentKind::ModernDoc, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConversionFailed { .. }));
    }
}
