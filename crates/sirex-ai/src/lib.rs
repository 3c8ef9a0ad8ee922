//! Enrichment layer: response recovery, retry policy, and the document
//! extraction client. The Gemini REST implementation is behind `gemini`.

mod error;
pub mod extractor;
pub mod recover;
pub mod retry;
pub mod service;
pub mod testing;

#[cfg(feature = "gemini")]
pub mod gemini;

pub use error::EnrichError;
pub use extractor::Extractor;
pub use recover::{RecoverError, recover_object};
pub use retry::{RetryPolicy, Retryable};
pub use service::{DETERMINISTIC, EnrichmentService, GenerationConfig, StagedDocument};

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
