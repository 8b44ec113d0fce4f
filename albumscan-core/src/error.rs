//! Scan error taxonomy
//!
//! Only identification failures, store failures and cancellation surface from a
//! scan. Review and artwork failures are absorbed into record flags by the
//! orchestrator and never reach this type.

use crate::providers::ProviderError;
use thiserror::Error;

/// Errors returned by [`crate::orchestrator::ScanOrchestrator`]
#[derive(Debug, Error)]
pub enum ScanError {
    /// Missing credentials or endpoint; fatal, never retried
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure or timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// Identification service throttled the request; the scan is aborted
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed or incomplete response
    #[error("Invalid response: {0}")]
    Validation(String),

    /// The cover could not be identified (after at most one refinement round)
    #[error("Album not identified: {0}")]
    Unresolved(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(#[from] albumscan_common::Error),
}

impl ScanError {
    /// Whether the user may simply try the same scan again
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ScanError::Configuration(_))
    }
}

impl From<ProviderError> for ScanError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Configuration(msg) => ScanError::Configuration(msg),
            ProviderError::Transport(msg) => ScanError::Transport(msg),
            ProviderError::RateLimited(msg) => ScanError::RateLimited(msg),
            ProviderError::Validation(msg) => ScanError::Validation(msg),
        }
    }
}

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;
