//! Test Helper Utilities
//!
//! Shared fixtures and fakes for albumscan-core integration tests

#![allow(dead_code)]

pub mod fakes;

pub use fakes::{CountingStore, FakeCatalogApi, FakeCoverArt, FakeIdentification, FakeReview};

use albumscan_core::artwork::ArtworkFetcher;
use albumscan_core::catalog::{CatalogResolver, ResolverSettings};
use albumscan_core::types::{
    CatalogCandidate, Confidence, EnrichmentResult, EntityKind, IdentificationResult,
    Recommendation,
};
use albumscan_core::utils::RetryPolicy;
use albumscan_core::{OrchestratorSettings, ScanDependencies, ScanOrchestrator};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// Bytes handed to `submit_image`; the fakes never look at them
pub const COVER_PHOTO: &[u8] = b"\xff\xd8\xff\xe0 photographed cover";

pub fn ok_computer() -> IdentificationResult {
    IdentificationResult {
        artist: "Radiohead".to_string(),
        title: "OK Computer".to_string(),
        year: Some("1997".to_string()),
        genres: vec!["Alternative Rock".to_string()],
        label: Some("Parlophone".to_string()),
        confidence: Confidence::High,
    }
}

pub fn ok_computer_review() -> EnrichmentResult {
    EnrichmentResult {
        summary: "A bleak, beautiful landmark of late-90s rock.".to_string(),
        bullets: vec![
            "Dense, layered production".to_string(),
            "Themes of alienation and technology".to_string(),
            "Hugely influential".to_string(),
        ],
        rating: 9.5,
        recommendation: Recommendation::Essential,
        key_tracks: vec!["Paranoid Android".to_string(), "Let Down".to_string()],
    }
}

pub fn candidate(
    id: &str,
    release_group_id: Option<&str>,
    country: Option<&str>,
    date: Option<&str>,
) -> CatalogCandidate {
    CatalogCandidate {
        id: id.to_string(),
        title: "OK Computer".to_string(),
        artist_name: "Radiohead".to_string(),
        release_date: date.map(str::to_string),
        country: country.map(str::to_string),
        release_group_id: release_group_id.map(str::to_string),
    }
}

/// Three OK Computer releases; rank 1 is `rel-gb` (GB, 1997-05-21)
pub fn ok_computer_candidates() -> Vec<CatalogCandidate> {
    vec![
        candidate("rel-jp", Some("rg-jp"), Some("JP"), Some("1997-05-21")),
        candidate("rel-us", Some("rg-us"), Some("US"), Some("1997-07-01")),
        candidate("rel-gb", Some("rg-gb"), Some("GB"), Some("1997-05-21")),
    ]
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([200, 200, 210])));
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Jpeg)
        .expect("jpeg encoding should succeed");
    cursor.into_inner()
}

pub fn fast_resolver_settings() -> ResolverSettings {
    ResolverSettings {
        search_limit: 10,
        probe_depth: 5,
        retry: RetryPolicy {
            max_attempts: 2,
            unavailable_backoff: Duration::from_millis(5),
            transport_backoff: Duration::from_millis(1),
        },
        courtesy_delay: Duration::ZERO,
    }
}

pub fn fast_orchestrator_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        min_state_dwell: Duration::ZERO,
        identification_timeout: Duration::from_secs(5),
        retry_cooldown: Duration::ZERO,
        event_capacity: 64,
    }
}

pub fn ok_computer_covers() -> FakeCoverArt {
    FakeCoverArt::new().with_front_cover(EntityKind::ReleaseGroup, "rg-us", jpeg_bytes(120, 100))
}

/// All collaborators of one test scan, kept for call-count assertions
pub struct Harness {
    pub identification: Arc<FakeIdentification>,
    pub review: Arc<FakeReview>,
    pub catalog: Arc<FakeCatalogApi>,
    pub cover_art: Arc<FakeCoverArt>,
    pub store: Arc<CountingStore>,
    pub orchestrator: ScanOrchestrator,
}

impl Harness {
    pub fn new(
        identification: FakeIdentification,
        review: FakeReview,
        catalog: FakeCatalogApi,
        cover_art: FakeCoverArt,
    ) -> Self {
        Self::with_store(identification, review, catalog, cover_art, CountingStore::new())
    }

    pub fn with_store(
        identification: FakeIdentification,
        review: FakeReview,
        catalog: FakeCatalogApi,
        cover_art: FakeCoverArt,
        store: CountingStore,
    ) -> Self {
        Self::assemble(
            identification,
            review,
            catalog,
            cover_art,
            store,
            fast_orchestrator_settings(),
        )
    }

    /// Real resolver and fetcher over the fakes
    pub fn assemble(
        identification: FakeIdentification,
        review: FakeReview,
        catalog: FakeCatalogApi,
        cover_art: FakeCoverArt,
        store: CountingStore,
        settings: OrchestratorSettings,
    ) -> Self {
        let identification = Arc::new(identification);
        let review = Arc::new(review);
        let catalog = Arc::new(catalog);
        let cover_art = Arc::new(cover_art);
        let store = Arc::new(store);

        let resolver = CatalogResolver::new(catalog.clone(), fast_resolver_settings());
        let fetcher = ArtworkFetcher::new(cover_art.clone(), 64);

        let orchestrator = ScanOrchestrator::new(
            ScanDependencies {
                identification: identification.clone(),
                review: review.clone(),
                catalog: Arc::new(resolver),
                artwork: Arc::new(fetcher),
                store: store.clone(),
            },
            settings,
        );

        Self {
            identification,
            review,
            catalog,
            cover_art,
            store,
            orchestrator,
        }
    }

    /// Happy path: OK Computer identified, reviewed, artwork on `rg-us`
    pub fn ok_computer() -> Self {
        Self::new(
            FakeIdentification::identifying(ok_computer()),
            FakeReview::returning(Ok(ok_computer_review())),
            FakeCatalogApi::new(ok_computer_candidates(), &["rg-us"]),
            ok_computer_covers(),
        )
    }
}
