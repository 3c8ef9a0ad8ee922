use std::path::PathBuf;

use sirex_ai::EnrichError;
use sirex_core::PayloadError;
use sirex_store::StoreError;
use thiserror::Error;

/// Failure of one document, or of summary persistence.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("prompt file {path} could not be read: {source}")]
    Prompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("extraction failed: {0}")]
    Enrich(#[from] EnrichError),

    #[error("invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProcessError {
    /// Whether the enrichment service was contacted before the failure.
    pub fn reached_service(&self) -> bool {
        !matches!(self, Self::Prompt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_errors_never_reach_the_service() {
        let prompt = ProcessError::Prompt {
            path: PathBuf::from("prompt.txt"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!prompt.reached_service());
        assert!(ProcessError::Enrich(EnrichError::NoText).reached_service());
    }
}
