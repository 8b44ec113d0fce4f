//! Catalog resolution: free-text (artist, title) → MusicBrainz identifier
//!
//! - [`CatalogApi`]: raw search and artwork-presence probe (HTTP in production)
//! - [`matching`]: candidate filtering and ranking, pure functions
//! - [`CatalogResolver`]: filter → rank → probe, with retry on transient failures

pub mod matching;
pub mod musicbrainz;
pub mod resolver;

pub use musicbrainz::MusicBrainzCatalog;
pub use resolver::{CatalogResolver, ResolverSettings};

use crate::types::{CatalogCandidate, EntityKind};
use crate::utils::{RetryPolicy, TransientError};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Catalog client errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    /// HTTP 503: the service asks callers to back off
    #[error("Catalog service unavailable (503)")]
    ServiceUnavailable,

    /// Transport failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl TransientError for CatalogError {
    fn retry_delay(&self, policy: &RetryPolicy) -> Option<Duration> {
        match self {
            CatalogError::ServiceUnavailable => Some(policy.unavailable_backoff),
            CatalogError::Network(_) => Some(policy.transport_backoff),
            CatalogError::Api(..) | CatalogError::Parse(_) => None,
        }
    }
}

/// External catalog operations used by the resolver
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Search releases matching (artist, title), at most `limit` results
    async fn search(
        &self,
        artist: &str,
        title: &str,
        limit: usize,
    ) -> Result<Vec<CatalogCandidate>, CatalogError>;

    /// Lightweight check whether cover artwork exists for `id`
    async fn has_artwork(&self, kind: EntityKind, id: &str) -> Result<bool, CatalogError>;
}

/// Resolve an album to the identifier used to fetch its artwork
///
/// `Ok(None)` means the catalog knows nothing usable; `Err` means it could not
/// be asked. The artwork branch treats both as "no id".
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn resolve(&self, artist: &str, title: &str) -> Result<Option<String>, CatalogError>;
}
