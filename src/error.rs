//! Shared error kinds for the evidence pipeline.
//!
//! Every component returns this `Error` rather than an ad-hoc error type so
//! that per-item pipeline failures can be aggregated into a uniform report.

use std::path::PathBuf;

/// Domain-level error kinds, one for each class named by the forensic
/// defensibility contract: some are fatal to the whole run (`IntegrityError`,
/// a corrupt store), most are scoped to a single evidence item and are
/// recorded rather than propagated by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("integrity error at {path}: {reason}")]
    IntegrityError { path: PathBuf, reason: String },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("AI provider refused to answer: {0}")]
    AiRefusal(String),

    #[error("AI provider returned an incomplete response: {0}")]
    AiIncomplete(String),

    #[error("AI provider call timed out after {0:?}")]
    AiTimeout(std::time::Duration),

    #[error("AI provider rate-limited the call{}", .retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    AiRateLimited { retry_after: Option<std::time::Duration> },

    #[error("extractor does not support this content: {0}")]
    ExtractorUnsupported(String),

    #[error("I/O failure at {path}: {source}")]
    IoFailure { path: PathBuf, source: std::io::Error },

    #[error("AI configuration missing: {0}")]
    ConfigMissing(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// `AiTimeout`/`AiRateLimited` are the only kinds the retry wrapper
    /// should ever re-attempt; everything else (refusal, schema failure,
    /// integrity, validation) is terminal for that call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::AiTimeout(_) | Error::AiRateLimited { .. })
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoFailure { path: path.into(), source }
    }

    pub fn integrity(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::IntegrityError { path: path.into(), reason: reason.into() }
    }
}
