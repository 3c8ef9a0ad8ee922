//! Stage → infer → release around an [`EnrichmentService`].

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::EnrichError;
use crate::recover::recover_object;
use crate::retry::RetryPolicy;
use crate::service::{EnrichmentService, StagedDocument};

/// Extraction client owning the retry policy for one service.
pub struct Extractor<S> {
    service: S,
    retry: RetryPolicy,
}

impl<S: EnrichmentService> Extractor<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn model(&self) -> &str {
        self.service.model()
    }

    /// Extract the JSON object the service returns for one document.
    ///
    /// Staging is attempted once. Inference plus response recovery runs
    /// under the retry policy. The staged handle is released on every path
    /// after a successful stage, and release errors are swallowed.
    pub async fn extract(
        &self,
        document: &Path,
        prompt: &str,
    ) -> Result<Map<String, Value>, EnrichError> {
        let staged = self.service.stage(document).await?;
        info!(document = %document.display(), handle = %staged.name, "staged document");

        let result = self
            .retry
            .run("inference", || self.infer_object(&staged, prompt))
            .await;

        if let Err(e) = self.service.release(&staged).await {
            debug!(handle = %staged.name, error = %e, "release failed, ignoring");
        }
        result
    }

    async fn infer_object(
        &self,
        staged: &StagedDocument,
        prompt: &str,
    ) -> Result<Map<String, Value>, EnrichError> {
        let text = self.service.infer(staged, prompt).await?;
        Ok(recover_object(&text)?)
    }
}
