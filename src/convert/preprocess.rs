//! Image-input preparation: the single uploaded image becomes page 1.
//!
//! With the preprocessing flag set, the image is decoded, lightly
//! contrast-stretched and re-encoded as PNG — scans and photos of
//! documents often arrive washed out, and the layout engine reads crisp
//! input noticeably better. Without the flag the bytes are copied through
//! untouched (aside from the canonical page filename).

use crate::convert::raster::page_file_name;
use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Amount of contrast stretch applied during preprocessing.
///
/// Contrast is the only adjustment made: EXIF orientation tags are not
/// read, so a rotated camera capture reaches the engine exactly as stored.
const CONTRAST_BOOST: f32 = 12.0;

/// Stage the uploaded image as the task's only page artifact.
///
/// Returns the path of `{stem}_page_1.png` (or the original extension when
/// copying through) inside `out_dir`.
pub async fn prepare_image(
    src: &Path,
    declared_filename: &str,
    out_dir: &Path,
    preprocess: bool,
) -> Result<PathBuf, PipelineError> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| PipelineError::ArtifactWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    let stem = Path::new(declared_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");

    if !preprocess {
        let ext = Path::new(declared_filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        let dest = out_dir.join(format!("{stem}_page_1.{ext}"));
        tokio::fs::copy(src, &dest)
            .await
            .map_err(|e| PipelineError::ArtifactWriteFailed {
                path: dest.clone(),
                source: e,
            })?;
        return Ok(dest);
    }

    let src = src.to_path_buf();
    let dest = out_dir.join(page_file_name(stem, 1));
    let dest_clone = dest.clone();

    // Decode/re-encode is CPU-bound.
    tokio::task::spawn_blocking(move || preprocess_blocking(&src, &dest_clone))
        .await
        .map_err(|e| PipelineError::Internal(format!("Preprocess task panicked: {e}")))??;

    Ok(dest)
}

fn preprocess_blocking(src: &Path, dest: &Path) -> Result<(), PipelineError> {
    // Uploads are stored under opaque names; the format must be sniffed
    // from content, never derived from the stored path's extension.
    let reader = image::ImageReader::open(src)
        .map_err(|e| PipelineError::ConversionFailed {
            detail: format!("cannot open image '{}': {e}", src.display()),
        })?
        .with_guessed_format()
        .map_err(|e| PipelineError::ConversionFailed {
            detail: format!("cannot probe the format of '{}': {e}", src.display()),
        })?;
    let img = reader.decode().map_err(|e| PipelineError::ConversionFailed {
        detail: format!("cannot decode image '{}': {e}", src.display()),
    })?;

    let adjusted = img.adjust_contrast(CONTRAST_BOOST);
    adjusted
        .save_with_format(dest, image::ImageFormat::Png)
        .map_err(|e| PipelineError::ArtifactWriteFailed {
            path: dest.to_path_buf(),
            source: std::io::Error::other(e),
        })?;

    debug!("Preprocessed '{}' → '{}'", src.display(), dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_test_png(path: &Path) {
        RgbImage::from_pixel(16, 16, Rgb([120, 120, 120]))
            .save_with_format(path, image::ImageFormat::Png)
            .unwrap();
    }

    #[tokio::test]
    async fn copy_through_keeps_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload");
        write_test_png(&src);

        let dest = prepare_image(&src, "scan.png", dir.path(), false)
            .await
            .unwrap();
        assert!(dest.ends_with("scan_page_1.png"));
        assert_eq!(
            std::fs::read(&src).unwrap(),
            std::fs::read(&dest).unwrap()
        );
    }

    #[tokio::test]
    async fn preprocess_reencodes_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload");
        write_test_png(&src);

        let dest = prepare_image(&src, "scan.jpg", dir.path(), true)
            .await
            .unwrap();
        assert!(dest.ends_with("scan_page_1.png"));
        assert!(image::open(&dest).is_ok());
    }

    #[tokio::test]
    async fn preprocess_sniffs_format_from_opaque_stored_name() {
        // Stored uploads carry no extension; only content identifies them.
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("3aa81c");
        write_test_png(&src);

        let dest = prepare_image(&src, "scan.png", dir.path(), true)
            .await
            .unwrap();
        assert!(image::open(&dest).is_ok());
    }

    #[tokio::test]
    async fn preprocess_decodes_bmp_input() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload");
        RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]))
            .save_with_format(&src, image::ImageFormat::Bmp)
            .unwrap();

        let dest = prepare_image(&src, "scan.bmp", dir.path(), true)
            .await
            .unwrap();
        assert!(dest.ends_with("scan_page_1.png"));
        assert!(image::open(&dest).is_ok());
    }

    #[tokio::test]
    async fn undecodable_input_is_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload");
        std::fs::write(&src, b"definitely not an image").unwrap();

        let err = prepare_image(&src, "scan.png", dir.path(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConversionFailed { .. }));
    }
}
