//! HTTP adapter for a remotely hosted OCR engine.
//!
//! The engine runs as its own service (typically a vLLM-hosted vision
//! model behind a thin JSON API). This adapter base64-encodes the page
//! image into the request body, names the prompt mode from the closed
//! vocabulary in [`crate::prompts`], and deserializes the structured
//! per-page response. Transport and protocol failures surface as
//! [`PipelineError::EngineFailure`]; deadlines are enforced one level up
//! by the orchestrator.

use crate::engine::{OcrEngine, PageRecognition, PageRequest};
use crate::error::PipelineError;
use crate::output::LayoutRegion;
use crate::prompts;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Client for a remote OCR engine speaking the pagemill JSON protocol:
/// `POST {base_url}/recognize` with a [`RecognizeRequest`] body,
/// `GET {base_url}/health` for readiness.
pub struct RemoteEngine {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    /// Base64-encoded page image (PNG or JPEG).
    image: String,
    prompt_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<[i32; 4]>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    page_num: Option<usize>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    regions: Vec<WireRegion>,
}

#[derive(Debug, Deserialize)]
struct WireRegion {
    bbox: [f64; 4],
    category: String,
    #[serde(default)]
    text: Option<String>,
}

impl RemoteEngine {
    /// Create a client for the engine at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl OcrEngine for RemoteEngine {
    async fn ensure_ready(&self) -> Result<(), PipelineError> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::EngineFailure {
                page: 0,
                detail: format!("engine unreachable at {url}: {e}"),
            })?;
        if !resp.status().is_success() {
            return Err(PipelineError::EngineFailure {
                page: 0,
                detail: format!("engine health check returned HTTP {}", resp.status()),
            });
        }
        Ok(())
    }

    async fn recognize(&self, req: PageRequest<'_>) -> Result<PageRecognition, PipelineError> {
        let page = req.page_num;
        let bytes = tokio::fs::read(req.image_path)
            .await
            .map_err(|e| PipelineError::EngineFailure {
                page,
                detail: format!("cannot read page image '{}': {e}", req.image_path.display()),
            })?;

        let body = RecognizeRequest {
            image: STANDARD.encode(&bytes),
            prompt_mode: prompts::prompt_name(req.mode),
            bbox: req.bbox.map(|b| b.as_array()),
        };
        debug!(
            "Page {}: POST /recognize ({} bytes image, mode {})",
            page,
            bytes.len(),
            body.prompt_mode
        );

        let resp = self
            .client
            .post(format!("{}/recognize", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::EngineFailure {
                page,
                detail: format!("request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(PipelineError::EngineFailure {
                page,
                detail: format!("engine returned HTTP {status}: {detail}"),
            });
        }

        let wire: RecognizeResponse =
            resp.json().await.map_err(|e| PipelineError::EngineFailure {
                page,
                detail: format!("malformed engine response: {e}"),
            })?;

        Ok(PageRecognition {
            page_num: wire.page_num.unwrap_or(page),
            text: wire.text,
            regions: wire
                .regions
                .into_iter()
                .map(|r| LayoutRegion {
                    bbox: r.bbox,
                    category: r.category,
                    text: r.text,
                })
                .collect(),
        })
    }
}
