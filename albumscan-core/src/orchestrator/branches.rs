//! The two enrichment branches
//!
//! Neither branch returns an error: every failure is logged and folded into
//! the outcome, which the orchestrator turns into record flags.

use crate::artwork::ArtworkSource;
use crate::catalog::CatalogLookup;
use crate::providers::ReviewClient;
use crate::types::{ArtworkBundle, EnrichmentResult, IdentificationResult};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    /// `None` = failed
    pub result: Option<EnrichmentResult>,
    /// Reused from a previous record; the review service was not called
    pub from_cache: bool,
    /// Set whenever the review service was called
    pub attempted_at: Option<DateTime<Utc>>,
}

impl ReviewOutcome {
    pub fn failed(&self) -> bool {
        self.result.is_none()
    }

    /// Outcome of a branch dropped before it settled
    pub fn interrupted(attempted_at: Option<DateTime<Utc>>) -> Self {
        Self {
            result: None,
            from_cache: false,
            attempted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArtworkOutcome {
    pub catalog_id: Option<String>,
    /// `None` = failed
    pub artwork: Option<ArtworkBundle>,
}

impl ArtworkOutcome {
    pub fn failed(&self) -> bool {
        self.artwork.as_ref().map_or(true, ArtworkBundle::is_empty)
    }
}

/// Reuse `cached` when present, otherwise ask the review service
pub async fn review_branch(
    client: &dyn ReviewClient,
    album: &IdentificationResult,
    cached: Option<EnrichmentResult>,
) -> ReviewOutcome {
    if let Some(review) = cached {
        info!(artist = %album.artist, title = %album.title, "Reusing cached review");
        return ReviewOutcome {
            result: Some(review),
            from_cache: true,
            attempted_at: None,
        };
    }

    let attempted_at = Utc::now();
    let result = match client.review(album).await {
        Ok(review) => {
            info!(
                artist = %album.artist,
                title = %album.title,
                backend = client.name(),
                rating = review.rating,
                "Review generated"
            );
            Some(review)
        }
        Err(e) => {
            warn!(
                artist = %album.artist,
                title = %album.title,
                backend = client.name(),
                error = %e,
                "Review failed, record will carry placeholder text"
            );
            None
        }
    };

    ReviewOutcome {
        result,
        from_cache: false,
        attempted_at: Some(attempted_at),
    }
}

/// Resolve a catalog id, then fetch its artwork
pub async fn artwork_branch(
    lookup: &dyn CatalogLookup,
    source: &dyn ArtworkSource,
    artist: &str,
    title: &str,
) -> ArtworkOutcome {
    let catalog_id = match lookup.resolve(artist, title).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            warn!(artist = %artist, title = %title, "No catalog id for album");
            return ArtworkOutcome::default();
        }
        Err(e) => {
            warn!(artist = %artist, title = %title, error = %e, "Catalog lookup failed");
            return ArtworkOutcome::default();
        }
    };

    let bundle = source.fetch(&catalog_id).await;
    ArtworkOutcome {
        artwork: Some(bundle).filter(|b| !b.is_empty()),
        catalog_id: Some(catalog_id),
    }
}
