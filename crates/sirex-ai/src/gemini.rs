//! Gemini REST client: File API staging and `generateContent` inference.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EnrichError;
use crate::service::{DETERMINISTIC, EnrichmentService, GenerationConfig, StagedDocument};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const PDF_MIME: &str = "application/pdf";

/// Gemini client bound to one model.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

// ── Wire types ──

#[derive(Serialize)]
struct UploadStart<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart<'a> {
    FileData(FileData<'a>),
    Text(&'a str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate, if any.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

impl GeminiClient {
    /// Create a client for `model` using the public Gemini endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Point the client at a different endpoint (proxy, emulator).
    ///
    /// `base_url` should not include the API version path.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, EnrichError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnrichError::Service {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl EnrichmentService for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    /// Resumable upload in two requests: start, then upload-and-finalize.
    async fn stage(&self, document: &Path) -> Result<StagedDocument, EnrichError> {
        let bytes = tokio::fs::read(document).await?;
        let display_name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let url = format!("{}/upload/v1beta/files", self.base_url);
        debug!(url = %url, bytes = bytes.len(), "starting upload");
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", PDF_MIME)
            .json(&UploadStart {
                file: UploadMetadata {
                    display_name: &display_name,
                },
            })
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        let upload_url = resp
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| EnrichError::Protocol("upload start returned no upload URL".into()))?
            .to_string();

        let resp = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::check(resp).await?.json().await?;

        info!(name = %uploaded.file.name, "uploaded document");
        Ok(StagedDocument {
            name: uploaded.file.name,
            uri: uploaded.file.uri,
            mime_type: uploaded.file.mime_type.unwrap_or_else(|| PDF_MIME.into()),
        })
    }

    async fn infer(&self, staged: &StagedDocument, prompt: &str) -> Result<String, EnrichError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = build_request(staged, prompt);

        debug!(url = %url, "generating content");
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response: GenerateResponse = Self::check(resp).await?.json().await?;
        response.text().ok_or(EnrichError::NoText)
    }

    async fn release(&self, staged: &StagedDocument) -> Result<(), EnrichError> {
        let url = format!("{}/v1beta/{}", self.base_url, staged.name);
        let resp = self
            .client
            .delete(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(name = %staged.name, "deleted staged document");
        Ok(())
    }
}

fn build_request<'a>(staged: &'a StagedDocument, prompt: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                RequestPart::FileData(FileData {
                    mime_type: &staged.mime_type,
                    file_uri: &staged.uri,
                }),
                RequestPart::Text(prompt),
            ],
        }],
        generation_config: DETERMINISTIC,
    }
}
