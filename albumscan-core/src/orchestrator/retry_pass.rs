//! Later retry of failed enrichment
//!
//! Records saved with `enrichment_failed` or `artwork_failed` are picked up
//! once their last attempt is older than the cooldown. Only the failed
//! branches are re-run (concurrently), and each record is committed once.

use super::branches::{artwork_branch, review_branch};
use super::ScanOrchestrator;
use crate::error::ScanResult;
use chrono::Utc;
use tracing::{debug, info};

/// Outcome of one retry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    /// Records re-attempted and committed
    pub attempted: usize,
    pub enrichment_recovered: usize,
    pub artwork_recovered: usize,
}

impl ScanOrchestrator {
    /// Re-run failed branches for up to `limit` stale records
    ///
    /// Store errors abort the pass; branch failures only leave the flags set.
    pub async fn retry_failed_enrichments(&self, limit: usize) -> ScanResult<RetrySummary> {
        let cooldown = chrono::Duration::from_std(self.settings.retry_cooldown)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let cutoff = Utc::now() - cooldown;

        let candidates = self.deps.store.list_retry_candidates(cutoff, limit).await?;
        let mut summary = RetrySummary::default();

        info!(candidates = candidates.len(), "Starting enrichment retry pass");

        for mut record in candidates {
            let album = record.identification();
            let retry_review = record.enrichment_failed;
            let retry_artwork = record.artwork_failed;

            debug!(
                record_id = %record.id,
                retry_review,
                retry_artwork,
                "Retrying enrichment"
            );

            let (review, artwork) = tokio::join!(
                async {
                    if retry_review {
                        Some(review_branch(self.deps.review.as_ref(), &album, None).await)
                    } else {
                        None
                    }
                },
                async {
                    if retry_artwork {
                        Some(
                            artwork_branch(
                                self.deps.catalog.as_ref(),
                                self.deps.artwork.as_ref(),
                                &album.artist,
                                &album.title,
                            )
                            .await,
                        )
                    } else {
                        None
                    }
                },
            );

            if let Some(review) = review {
                if !review.failed() {
                    summary.enrichment_recovered += 1;
                }
                record.apply_enrichment(review.result, review.attempted_at);
            }
            if let Some(artwork) = artwork {
                if !artwork.failed() {
                    summary.artwork_recovered += 1;
                }
                record.apply_artwork(artwork.catalog_id, artwork.artwork);
            }

            // Artwork-only retries must also restart the cooldown
            record.last_enrichment_attempt = Some(Utc::now());

            self.deps.store.save(&record).await?;
            summary.attempted += 1;
        }

        info!(
            attempted = summary.attempted,
            enrichment_recovered = summary.enrichment_recovered,
            artwork_recovered = summary.artwork_recovered,
            "Enrichment retry pass finished"
        );

        Ok(summary)
    }
}
