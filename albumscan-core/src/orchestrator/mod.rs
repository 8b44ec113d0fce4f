//! Scan orchestration
//!
//! One scan = one identification (plus at most one refinement round), then
//! two concurrent best-effort branches, then exactly one store commit:
//!
//! ```text
//! Idle → Identifying ─┬─ IdentificationFailed
//!                     ├─ Cancelled
//!                     └─ Identified → EnrichingParallel ─┬─ Complete
//!                                     (review ∥ artwork) └─ Cancelled
//! ```
//!
//! Only identification failures, cancellation before identification, and
//! store failures surface as errors. Review and artwork failures become
//! `enrichment_failed` / `artwork_failed` on the committed record.
//!
//! Cancelling during `EnrichingParallel` drops whichever branch has not
//! settled, still commits the record so the identification is kept, and ends
//! the scan in `Cancelled`. A cached review is always kept. Dropped artwork
//! leaves the previous record's artwork in place; a dropped review call
//! counts as a failed attempt.

pub mod branches;
pub mod retry_pass;
pub mod state;

pub use branches::{ArtworkOutcome, ReviewOutcome};
pub use retry_pass::RetrySummary;
pub use state::{ScanSession, StateTransition};

use crate::artwork::{ArtworkFetcher, ArtworkSource, CoverArtArchive};
use crate::catalog::{CatalogLookup, CatalogResolver, MusicBrainzCatalog, ResolverSettings};
use crate::error::{ScanError, ScanResult};
use crate::providers::{
    build_identification_client, build_review_client, IdentificationClient, ProviderError,
    ReviewClient,
};
use crate::store::AlbumStore;
use crate::types::{AlbumRecord, EnrichmentResult, IdentificationOutcome, IdentificationResult};
use albumscan_common::config::{OrchestratorConfig, TomlConfig};
use albumscan_common::{EventBus, ScanBranch, ScanEvent, ScanState};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Collaborators injected at construction
#[derive(Clone)]
pub struct ScanDependencies {
    pub identification: Arc<dyn IdentificationClient>,
    pub review: Arc<dyn ReviewClient>,
    pub catalog: Arc<dyn CatalogLookup>,
    pub artwork: Arc<dyn ArtworkSource>,
    pub store: Arc<dyn AlbumStore>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Presentation throttle applied when leaving each state
    pub min_state_dwell: Duration,
    /// Upper bound on each identification round
    pub identification_timeout: Duration,
    /// Retry pass skips records attempted more recently than this
    pub retry_cooldown: Duration,
    pub event_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for OrchestratorSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            min_state_dwell: Duration::from_millis(config.min_state_dwell_ms),
            identification_timeout: Duration::from_secs(config.identification_timeout_secs),
            retry_cooldown: Duration::from_secs(config.retry_cooldown_secs),
            event_capacity: config.event_capacity,
        }
    }
}

/// Result of a scan that produced a record
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scan_id: Uuid,
    /// Id of the committed row (an existing row's id on a cache hit)
    pub record_id: String,
    pub record: AlbumRecord,
    /// `Complete`, or `Cancelled` when cancellation arrived during enrichment
    pub final_state: ScanState,
    pub review_from_cache: bool,
}

pub struct ScanOrchestrator {
    deps: ScanDependencies,
    settings: OrchestratorSettings,
    events: EventBus,
}

impl ScanOrchestrator {
    pub fn new(deps: ScanDependencies, settings: OrchestratorSettings) -> Self {
        let events = EventBus::new(settings.event_capacity);
        Self {
            deps,
            settings,
            events,
        }
    }

    /// Wire the production collaborators described by `config`
    ///
    /// Missing API keys fail here, before any scan is attempted.
    pub fn from_config(config: &TomlConfig, store: Arc<dyn AlbumStore>) -> ScanResult<Self> {
        let identification = build_identification_client(&config.identification)?;
        let review = build_review_client(&config.review)?;

        let catalog_api = MusicBrainzCatalog::new(&config.catalog)
            .map_err(|e| ScanError::Configuration(format!("catalog client: {}", e)))?;
        let catalog = CatalogResolver::new(
            Arc::new(catalog_api),
            ResolverSettings::from(&config.catalog),
        );

        let archive = CoverArtArchive::new(&config.artwork)
            .map_err(|e| ScanError::Configuration(format!("artwork client: {}", e)))?;
        let artwork = ArtworkFetcher::new(Arc::new(archive), config.artwork.thumbnail_edge_px);

        info!(
            identification = identification.name(),
            review = review.name(),
            "Scan orchestrator configured"
        );

        Ok(Self::new(
            ScanDependencies {
                identification,
                review,
                catalog: Arc::new(catalog),
                artwork: Arc::new(artwork),
                store,
            },
            OrchestratorSettings::from(&config.orchestrator),
        ))
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Identify, enrich and persist the album on `image`
    pub async fn submit_image(&self, image: &[u8]) -> ScanResult<ScanReport> {
        self.submit_image_with_cancel(image, CancellationToken::new()).await
    }

    /// [`submit_image`](Self::submit_image) with cooperative cancellation
    pub async fn submit_image_with_cancel(
        &self,
        image: &[u8],
        cancel: CancellationToken,
    ) -> ScanResult<ScanReport> {
        let scan_id = Uuid::new_v4();
        let mut session = ScanSession::new(scan_id, self.settings.min_state_dwell, self.events.clone())
            .with_cancel(cancel.clone());

        info!(scan_id = %scan_id, image_bytes = image.len(), "Scan started");

        session.transition_to(ScanState::Identifying).await;

        let identification = match self.identify(scan_id, image, &cancel).await {
            Ok(result) => result,
            Err(ScanError::Cancelled) => {
                warn!(scan_id = %scan_id, "Scan cancelled during identification");
                session.transition_to(ScanState::Cancelled).await;
                return Err(ScanError::Cancelled);
            }
            Err(e) => {
                warn!(scan_id = %scan_id, error = %e, "Identification failed");
                session.transition_to(ScanState::IdentificationFailed).await;
                self.events.emit_lossy(ScanEvent::ScanFailed {
                    scan_id,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        info!(
            scan_id = %scan_id,
            artist = %identification.artist,
            title = %identification.title,
            confidence = identification.confidence.as_str(),
            "Album identified"
        );
        session.transition_to(ScanState::Identified).await;

        let cached = match self
            .deps
            .store
            .find_by_artist_title(&identification.artist, &identification.title)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!(scan_id = %scan_id, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        };
        let cached_review = cached.as_ref().and_then(AlbumRecord::enrichment);

        session.transition_to(ScanState::EnrichingParallel).await;

        let (review, artwork) = tokio::join!(
            self.review_leg(scan_id, &identification, cached_review, &cancel),
            self.artwork_leg(scan_id, &identification, &cancel),
        );
        let cancelled = cancel.is_cancelled();

        let mut record = AlbumRecord::for_identification(&identification, cached.as_ref());
        record.apply_enrichment(review.result, review.attempted_at);
        match (artwork, cached.as_ref()) {
            (Some(outcome), _) => record.apply_artwork(outcome.catalog_id, outcome.artwork),
            (None, Some(previous)) => {
                record.apply_artwork(previous.catalog_id.clone(), previous.artwork.clone())
            }
            (None, None) => record.apply_artwork(None, None),
        }

        let record_id = match self.deps.store.save(&record).await {
            Ok(id) => id,
            Err(e) => {
                error!(scan_id = %scan_id, error = %e, "Failed to commit album record");
                self.events.emit_lossy(ScanEvent::ScanFailed {
                    scan_id,
                    message: e.to_string(),
                });
                return Err(ScanError::Store(e));
            }
        };
        record.id = record_id.clone();

        self.events.emit_lossy(ScanEvent::RecordCommitted {
            scan_id,
            record_id: record_id.clone(),
        });

        let final_state = if cancelled {
            ScanState::Cancelled
        } else {
            ScanState::Complete
        };
        session.transition_to(final_state).await;

        info!(
            scan_id = %scan_id,
            record_id = %record_id,
            enrichment_failed = record.enrichment_failed,
            artwork_failed = record.artwork_failed,
            final_state = %final_state,
            "Scan finished"
        );

        Ok(ScanReport {
            scan_id,
            record_id,
            record,
            final_state,
            review_from_cache: review.from_cache,
        })
    }

    /// Identification with at most one refinement round
    async fn identify(
        &self,
        scan_id: Uuid,
        image: &[u8],
        cancel: &CancellationToken,
    ) -> ScanResult<IdentificationResult> {
        if image.is_empty() {
            return Err(ScanError::Validation("image is empty".to_string()));
        }

        let client = &self.deps.identification;
        let mut outcome = self.bounded_round(cancel, client.identify(image)).await?;

        if let IdentificationOutcome::NeedsRefinement(refinement) = outcome {
            info!(
                scan_id = %scan_id,
                query = %refinement.query,
                reason = %refinement.reason,
                "Identification requested a refinement round"
            );
            self.events.emit_lossy(ScanEvent::RefinementRequested {
                scan_id,
                query: refinement.query.clone(),
                reason: refinement.reason.clone(),
            });
            outcome = self
                .bounded_round(cancel, client.identify_with_refinement(image, &refinement))
                .await?;
        }

        match outcome {
            IdentificationOutcome::Identified(result) => Ok(result),
            IdentificationOutcome::Unresolved(message) => Err(ScanError::Unresolved(message)),
            // Only two rounds are ever issued
            IdentificationOutcome::NeedsRefinement(refinement) => Err(ScanError::Unresolved(format!(
                "still unresolved after refinement: {}",
                refinement.reason
            ))),
        }
    }

    /// One identification round, bounded by the timeout and the cancel token
    async fn bounded_round<F>(&self, cancel: &CancellationToken, round: F) -> ScanResult<IdentificationOutcome>
    where
        F: Future<Output = Result<IdentificationOutcome, ProviderError>>,
    {
        let timeout = self.settings.identification_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            result = tokio::time::timeout(timeout, round) => match result {
                Ok(outcome) => outcome.map_err(ScanError::from),
                Err(_) => Err(ScanError::Transport(format!(
                    "identification timed out after {}s",
                    timeout.as_secs()
                ))),
            },
        }
    }

    async fn review_leg(
        &self,
        scan_id: Uuid,
        album: &IdentificationResult,
        cached: Option<EnrichmentResult>,
        cancel: &CancellationToken,
    ) -> ReviewOutcome {
        let outcome = match cached {
            // Cached reviews need no I/O and survive cancellation
            Some(review) => branches::review_branch(self.deps.review.as_ref(), album, Some(review)).await,
            None => {
                let started = Utc::now();
                let branch = branches::review_branch(self.deps.review.as_ref(), album, None);
                match until_cancelled(cancel, branch).await {
                    Some(outcome) => outcome,
                    None => {
                        warn!(scan_id = %scan_id, "Review branch cancelled before it settled");
                        ReviewOutcome::interrupted(Some(started))
                    }
                }
            }
        };

        self.events.emit_lossy(ScanEvent::BranchSettled {
            scan_id,
            branch: ScanBranch::Review,
            failed: outcome.failed(),
            from_cache: outcome.from_cache,
        });
        outcome
    }

    /// `None` when cancelled before the branch settled
    async fn artwork_leg(
        &self,
        scan_id: Uuid,
        album: &IdentificationResult,
        cancel: &CancellationToken,
    ) -> Option<ArtworkOutcome> {
        let branch = branches::artwork_branch(
            self.deps.catalog.as_ref(),
            self.deps.artwork.as_ref(),
            &album.artist,
            &album.title,
        );

        let outcome = until_cancelled(cancel, branch).await;
        if outcome.is_none() {
            warn!(scan_id = %scan_id, "Artwork branch cancelled before it settled");
        }

        self.events.emit_lossy(ScanEvent::BranchSettled {
            scan_id,
            branch: ScanBranch::Artwork,
            failed: outcome.as_ref().map_or(true, ArtworkOutcome::failed),
            from_cache: false,
        });
        outcome
    }
}

/// `None` when `cancel` fires before `work` completes
async fn until_cancelled<F: Future>(cancel: &CancellationToken, work: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = work => Some(output),
    }
}
