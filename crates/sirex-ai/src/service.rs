//! The enrichment service seam.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::EnrichError;

/// Handle to a document staged with the enrichment service.
///
/// Only valid between [`EnrichmentService::stage`] and
/// [`EnrichmentService::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDocument {
    /// Service-side resource name, used for release.
    pub name: String,
    /// URI referenced from inference requests.
    pub uri: String,
    pub mime_type: String,
}

/// Generation settings sent with every inference request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub response_mime_type: &'static str,
}

/// Deterministic structured output: temperature zero, JSON response mode.
pub const DETERMINISTIC: GenerationConfig = GenerationConfig {
    temperature: 0.0,
    response_mime_type: "application/json",
};

/// An external document-understanding service.
///
/// Implementations perform a single raw call per method; retry, response
/// recovery and release discipline live in [`crate::Extractor`].
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Model identifier recorded in output artifacts.
    fn model(&self) -> &str;

    /// Upload a document and return its handle.
    async fn stage(&self, document: &Path) -> Result<StagedDocument, EnrichError>;

    /// Run inference over a staged document with [`DETERMINISTIC`] settings.
    async fn infer(&self, staged: &StagedDocument, prompt: &str) -> Result<String, EnrichError>;

    /// Delete a staged document.
    async fn release(&self, staged: &StagedDocument) -> Result<(), EnrichError>;
}
