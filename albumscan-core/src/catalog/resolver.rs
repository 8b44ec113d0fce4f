//! Catalog resolver: search → filter → rank → artwork probe
//!
//! # Algorithm
//! 1. Courtesy pause, then search (retried on 503 / transport failure)
//! 2. Filter on artist containment and title-token overlap (unfiltered fallback)
//! 3. Rank by preferred country, then ascending release date
//! 4. Probe the top `probe_depth` candidates, release-group before release
//! 5. No probe hit: return rank-1's release-group id (or release id) unconfirmed
//!
//! Probe failures count as "no artwork here" and move on to the next id.

use super::matching::{filter_candidates, rank_candidates};
use super::{CatalogApi, CatalogError, CatalogLookup};
use crate::types::{CatalogCandidate, EntityKind};
use crate::utils::{retry_transient, RetryPolicy};
use albumscan_common::config::CatalogConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolver tuning
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Maximum candidates requested per search
    pub search_limit: usize,
    /// Number of ranked candidates probed for artwork
    pub probe_depth: usize,
    pub retry: RetryPolicy,
    /// Pause before every outbound search request
    pub courtesy_delay: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&CatalogConfig::default())
    }
}

impl From<&CatalogConfig> for ResolverSettings {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            search_limit: config.search_limit,
            probe_depth: config.probe_depth,
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                unavailable_backoff: Duration::from_millis(config.unavailable_backoff_ms),
                transport_backoff: Duration::from_millis(config.transport_backoff_ms),
            },
            courtesy_delay: Duration::from_millis(config.courtesy_delay_ms),
        }
    }
}

/// Resolves (artist, title) to the catalog id used as the artwork anchor
pub struct CatalogResolver {
    api: Arc<dyn CatalogApi>,
    settings: ResolverSettings,
}

impl CatalogResolver {
    pub fn new(api: Arc<dyn CatalogApi>, settings: ResolverSettings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    async fn search(&self, artist: &str, title: &str) -> Result<Vec<CatalogCandidate>, CatalogError> {
        let api = &self.api;
        let courtesy_delay = self.settings.courtesy_delay;
        let limit = self.settings.search_limit;

        retry_transient("catalog search", &self.settings.retry, || async move {
            if !courtesy_delay.is_zero() {
                tokio::time::sleep(courtesy_delay).await;
            }
            api.search(artist, title, limit).await
        })
        .await
    }

    async fn probe(&self, kind: EntityKind, id: &str) -> bool {
        match self.api.has_artwork(kind, id).await {
            Ok(present) => present,
            Err(e) => {
                debug!(kind = ?kind, id = %id, error = %e, "Artwork probe failed, treating as absent");
                false
            }
        }
    }

    /// First probed id with artwork, release-group preferred per candidate
    async fn first_with_artwork(&self, ranked: &[CatalogCandidate]) -> Option<String> {
        for candidate in ranked.iter().take(self.settings.probe_depth) {
            if let Some(rg_id) = candidate.release_group_id.as_deref() {
                if self.probe(EntityKind::ReleaseGroup, rg_id).await {
                    return Some(rg_id.to_string());
                }
            }
            if self.probe(EntityKind::Release, &candidate.id).await {
                return Some(candidate.id.clone());
            }
        }
        None
    }
}

#[async_trait]
impl CatalogLookup for CatalogResolver {
    async fn resolve(&self, artist: &str, title: &str) -> Result<Option<String>, CatalogError> {
        let candidates = self.search(artist, title).await?;
        if candidates.is_empty() {
            info!(artist = %artist, title = %title, "Catalog search returned no candidates");
            return Ok(None);
        }

        let ranked = rank_candidates(filter_candidates(artist, title, candidates));

        if let Some(id) = self.first_with_artwork(&ranked).await {
            info!(artist = %artist, title = %title, catalog_id = %id, "Resolved catalog id with artwork");
            return Ok(Some(id));
        }

        // Non-empty: filtering never empties the list
        let fallback = ranked
            .first()
            .map(|top| top.release_group_id.clone().unwrap_or_else(|| top.id.clone()));

        if let Some(id) = &fallback {
            warn!(
                artist = %artist,
                title = %title,
                catalog_id = %id,
                "No probed candidate reported artwork, using top-ranked id unconfirmed"
            );
        }
        Ok(fallback)
    }
}
