//! Scripted in-memory stand-ins for every external collaborator

use albumscan_core::artwork::{ArtworkError, CoverArtApi, CoverImage};
use albumscan_core::catalog::{CatalogApi, CatalogError};
use albumscan_core::providers::{IdentificationClient, ProviderError, ReviewClient};
use albumscan_core::store::{AlbumStore, MemoryAlbumStore};
use albumscan_core::types::{
    AlbumRecord, CatalogCandidate, EnrichmentResult, EntityKind, IdentificationOutcome,
    IdentificationResult, SearchRefinement,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Identification
// ============================================================================

/// Pops one scripted outcome per round, then answers `exhausted` forever
pub struct FakeIdentification {
    rounds: Mutex<VecDeque<Result<IdentificationOutcome, ProviderError>>>,
    exhausted: IdentificationOutcome,
    delay: Duration,
    pub identify_calls: AtomicUsize,
    pub refinement_calls: AtomicUsize,
    pub last_refinement: Mutex<Option<SearchRefinement>>,
}

impl FakeIdentification {
    pub fn scripted(rounds: Vec<Result<IdentificationOutcome, ProviderError>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            exhausted: IdentificationOutcome::Unresolved("script exhausted".to_string()),
            delay: Duration::ZERO,
            identify_calls: AtomicUsize::new(0),
            refinement_calls: AtomicUsize::new(0),
            last_refinement: Mutex::new(None),
        }
    }

    /// Identifies `result` on every round
    pub fn identifying(result: IdentificationResult) -> Self {
        let mut fake = Self::scripted(Vec::new());
        fake.exhausted = IdentificationOutcome::Identified(result);
        fake
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.identify_calls.load(Ordering::SeqCst) + self.refinement_calls.load(Ordering::SeqCst)
    }

    async fn next_round(&self) -> Result<IdentificationOutcome, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.rounds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.exhausted.clone()))
    }
}

#[async_trait]
impl IdentificationClient for FakeIdentification {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn identify(&self, _image: &[u8]) -> Result<IdentificationOutcome, ProviderError> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);
        self.next_round().await
    }

    async fn identify_with_refinement(
        &self,
        _image: &[u8],
        refinement: &SearchRefinement,
    ) -> Result<IdentificationOutcome, ProviderError> {
        self.refinement_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refinement.lock().unwrap() = Some(refinement.clone());
        self.next_round().await
    }
}

// ============================================================================
// Review
// ============================================================================

pub struct FakeReview {
    result: Mutex<Result<EnrichmentResult, ProviderError>>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeReview {
    pub fn returning(result: Result<EnrichmentResult, ProviderError>) -> Self {
        Self {
            result: Mutex::new(result),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_result(&self, result: Result<EnrichmentResult, ProviderError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReviewClient for FakeReview {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn review(&self, _album: &IdentificationResult) -> Result<EnrichmentResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.lock().unwrap().clone()
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Scripted search responses, then `fallback` forever; artwork only for listed ids
pub struct FakeCatalogApi {
    responses: Mutex<VecDeque<Result<Vec<CatalogCandidate>, CatalogError>>>,
    fallback: Vec<CatalogCandidate>,
    with_artwork: HashSet<String>,
    pub searches: AtomicUsize,
    pub probes: Mutex<Vec<(EntityKind, String)>>,
}

impl FakeCatalogApi {
    pub fn new(candidates: Vec<CatalogCandidate>, with_artwork: &[&str]) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: candidates,
            with_artwork: with_artwork.iter().map(|s| s.to_string()).collect(),
            searches: AtomicUsize::new(0),
            probes: Mutex::new(Vec::new()),
        }
    }

    /// Responses served before the fallback list
    pub fn then_respond(self, responses: Vec<Result<Vec<CatalogCandidate>, CatalogError>>) -> Self {
        *self.responses.lock().unwrap() = responses.into();
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogApi for FakeCatalogApi {
    async fn search(
        &self,
        _artist: &str,
        _title: &str,
        limit: usize,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let scripted = self.responses.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(self.fallback.iter().take(limit).cloned().collect()),
        }
    }

    async fn has_artwork(&self, kind: EntityKind, id: &str) -> Result<bool, CatalogError> {
        self.probes.lock().unwrap().push((kind, id.to_string()));
        Ok(self.with_artwork.contains(id))
    }
}

// ============================================================================
// Cover art
// ============================================================================

/// Listings keyed by (kind, id), file bodies keyed by URL
#[derive(Default)]
pub struct FakeCoverArt {
    listings: HashMap<(EntityKind, String), Vec<CoverImage>>,
    files: HashMap<String, Vec<u8>>,
    delay: Duration,
    pub downloads: AtomicUsize,
}

impl FakeCoverArt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every download sleeps `delay` first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Approved front cover with a mid-size variant, both downloadable
    pub fn with_front_cover(mut self, kind: EntityKind, id: &str, bytes: Vec<u8>) -> Self {
        let original = format!("http://covers.test/{}/{}/front.jpg", kind.path_segment(), id);
        let mid_size = format!("http://covers.test/{}/{}/front-500.jpg", kind.path_segment(), id);
        self.listings.insert(
            (kind, id.to_string()),
            vec![CoverImage {
                front: true,
                approved: Some(true),
                types: vec!["Front".to_string()],
                url: original.clone(),
                thumbnail_url: Some(mid_size.clone()),
            }],
        );
        self.files.insert(original, bytes.clone());
        self.files.insert(mid_size, bytes);
        self
    }
}

#[async_trait]
impl CoverArtApi for FakeCoverArt {
    async fn get_images(&self, kind: EntityKind, id: &str) -> Result<Vec<CoverImage>, ArtworkError> {
        self.listings
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or(ArtworkError::NotFound)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ArtworkError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| ArtworkError::Network(format!("connection refused: {}", url)))
    }
}

// ============================================================================
// Store
// ============================================================================

/// Memory store that counts calls and can be told to fail saves
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryAlbumStore,
    pub finds: AtomicUsize,
    pub saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn seed(&self, record: &AlbumRecord) {
        self.inner.save(record).await.unwrap();
    }
}

#[async_trait]
impl AlbumStore for CountingStore {
    async fn find_by_artist_title(
        &self,
        artist: &str,
        title: &str,
    ) -> albumscan_common::Result<Option<AlbumRecord>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_artist_title(artist, title).await
    }

    async fn save(&self, record: &AlbumRecord) -> albumscan_common::Result<String> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(albumscan_common::Error::Internal("disk full".to_string()));
        }
        self.inner.save(record).await
    }

    async fn list_retry_candidates(
        &self,
        attempted_before: DateTime<Utc>,
        limit: usize,
    ) -> albumscan_common::Result<Vec<AlbumRecord>> {
        self.inner.list_retry_candidates(attempted_before, limit).await
    }
}
