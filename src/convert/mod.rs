//! Format normalization: any supported input → PDF → ordered page images.
//!
//! Two independently testable responsibilities:
//!
//! 1. [`DocToPdf`] — word-processor documents to PDF, using an external
//!    conversion tool when one is available and a lossy in-process text
//!    reconstruction otherwise.
//! 2. [`raster::to_pages`] — PDF to one raster image per page, in page
//!    order. The returned order IS the page order for every downstream
//!    stage.
//!
//! Strategy selection happens exactly once, at orchestrator construction.
//! If the external tool binary cannot be located at startup, the converter
//! holds the fallback strategy for the life of the process — there is no
//! per-call re-probing of tool discovery.

pub mod external;
pub mod fallback;
pub mod preprocess;
pub mod raster;

use crate::classify::DocumentKind;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Doc-to-PDF conversion strategy, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Out-of-process LibreOffice run with a hard timeout.
    ExternalTool(PathBuf),
    /// Text-only in-process reconstruction. Lossy: tables, images, and
    /// complex formatting are not preserved.
    InProcess,
}

/// Normalizes legacy/modern word-processor documents into PDF.
pub struct DocToPdf {
    strategy: Strategy,
    timeout_secs: u64,
}

impl DocToPdf {
    /// Pick the strategy once: an explicitly configured tool path, a probed
    /// well-known location, or the in-process fallback.
    pub fn detect(config: &PipelineConfig) -> Self {
        let strategy = if config.force_fallback {
            Strategy::InProcess
        } else if let Some(ref path) = config.soffice_path {
            // An explicit path is taken on faith; a bad one surfaces as a
            // ConversionFailed at first use rather than a silent downgrade.
            Strategy::ExternalTool(path.clone())
        } else {
            match external::probe_tool() {
                Some(path) => Strategy::ExternalTool(path),
                None => {
                    warn!("No document conversion tool found; using in-process text fallback");
                    Strategy::InProcess
                }
            }
        };
        info!("Doc-to-PDF strategy: {:?}", strategy);
        Self {
            strategy,
            timeout_secs: config.convert_timeout_secs,
        }
    }

    /// The strategy this converter was constructed with.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Convert a word-processor document to a PDF inside `out_dir`.
    ///
    /// The produced file is named `{stem}.pdf` after the input.
    pub async fn to_pdf(
        &self,
        doc_path: &Path,
        kind: DocumentKind,
        out_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        debug_assert!(matches!(
            kind,
            DocumentKind::LegacyDoc | DocumentKind::ModernDoc
        ));
        match &self.strategy {
            Strategy::ExternalTool(tool) => {
                external::convert(tool, doc_path, out_dir, self.timeout_secs).await
            }
            Strategy::InProcess => fallback::convert(doc_path, kind, out_dir).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn force_fallback_skips_probing() {
        let config = PipelineConfig::builder()
            .force_fallback(true)
            .build()
            .unwrap();
        let converter = DocToPdf::detect(&config);
        assert_eq!(*converter.strategy(), Strategy::InProcess);
    }

    #[test]
    fn explicit_tool_path_is_kept() {
        let config = PipelineConfig::builder()
            .soffice_path("/opt/libreoffice/soffice")
            .build()
            .unwrap();
        let converter = DocToPdf::detect(&config);
        assert_eq!(
            *converter.strategy(),
            Strategy::ExternalTool(PathBuf::from("/opt/libreoffice/soffice"))
        );
    }
}
