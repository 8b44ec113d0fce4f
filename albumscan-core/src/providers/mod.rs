//! Identification and review backends
//!
//! Backend-agnostic capability traits with named implementations chosen from
//! configuration at construction time:
//!
//! - [`IdentificationClient`]: cover image → album metadata, refinement hint or "unresolved"
//! - [`ReviewClient`]: album metadata → review, rating and recommendation
//!
//! Both backends speak the same JSON payload contract (see [`response`]), so a
//! deployment can identify with one vendor and review with another.

pub mod gemini;
pub mod openai;
pub mod prompts;
pub mod response;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::types::{EnrichmentResult, IdentificationOutcome, IdentificationResult, SearchRefinement};
use albumscan_common::config::{ProviderConfig, ProviderKind};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Backend call errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Missing or rejected credentials, bad endpoint
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure, timeout, or unexpected HTTP status
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP 429
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Response could not be parsed or failed validation
    #[error("Invalid response: {0}")]
    Validation(String),
}

impl From<albumscan_common::Error> for ProviderError {
    fn from(err: albumscan_common::Error) -> Self {
        ProviderError::Configuration(err.to_string())
    }
}

/// Identify an album from a photographed cover
#[async_trait]
pub trait IdentificationClient: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// First identification round
    async fn identify(&self, image: &[u8]) -> Result<IdentificationOutcome, ProviderError>;

    /// Second round, seeded with the hint returned by the first
    async fn identify_with_refinement(
        &self,
        image: &[u8],
        refinement: &SearchRefinement,
    ) -> Result<IdentificationOutcome, ProviderError>;
}

/// Write a critical review of an identified album
#[async_trait]
pub trait ReviewClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Review `album`; the result has already passed [`EnrichmentResult::validate`]
    async fn review(&self, album: &IdentificationResult) -> Result<EnrichmentResult, ProviderError>;
}

/// Build the identification backend named in `config`
pub fn build_identification_client(
    config: &ProviderConfig,
) -> Result<Arc<dyn IdentificationClient>, ProviderError> {
    Ok(match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
        ProviderKind::Gemini => Arc::new(GeminiClient::from_config(config)?),
    })
}

/// Build the review backend named in `config`
pub fn build_review_client(config: &ProviderConfig) -> Result<Arc<dyn ReviewClient>, ProviderError> {
    Ok(match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
        ProviderKind::Gemini => Arc::new(GeminiClient::from_config(config)?),
    })
}

/// Map a non-success HTTP status to the error taxonomy
pub(crate) fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Configuration(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        _ => ProviderError::Transport(detail),
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Transport(format!("request timed out: {}", err))
    } else {
        ProviderError::Transport(err.to_string())
    }
}

/// MIME type sniffed from the image bytes
pub(crate) fn image_mime_type(image: &[u8]) -> Result<&'static str, ProviderError> {
    image::guess_format(image)
        .map(|format| format.to_mime_type())
        .map_err(|e| ProviderError::Validation(format!("unrecognised image data: {}", e)))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
