use thiserror::Error;

use crate::recover::RecoverError;
use crate::retry::Retryable;

/// Failures of the enrichment call chain (stage, infer, release).
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("structural response error: {0}")]
    Structural(#[from] RecoverError),

    #[error("model response did not contain text output")]
    NoText,

    #[error("reading document failed: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("unexpected service response: {0}")]
    Protocol(String),

    #[error("transient failure: {0}")]
    Transient(String),
}

/// Structural failures describe the model output itself; repeating the call
/// cannot fix them. Everything else is treated as transient.
impl Retryable for EnrichError {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Structural(_) | Self::NoText)
    }
}
