//! Core data model
//!
//! - Identification: what the cover shows (`IdentificationResult`), or a hint
//!   for one more round (`SearchRefinement`)
//! - Enrichment: the review attached to an identified album (`EnrichmentResult`)
//! - Catalog: search candidates and the artwork downloaded for one of them
//! - `AlbumRecord`: the single persisted row combining all of the above

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Summary stored when the review branch failed
pub const PLACEHOLDER_SUMMARY: &str = "Review unavailable. It will be retried automatically.";

/// Maximum number of bullets kept from a review
pub const MAX_REVIEW_BULLETS: usize = 5;

/// Normalised cache key: trimmed, lower-cased (artist, title)
pub fn cache_key(artist: &str, title: &str) -> (String, String) {
    (artist.trim().to_lowercase(), title.trim().to_lowercase())
}

// ============================================================================
// Identification
// ============================================================================

/// How sure the identification service is about its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence '{}'", other)),
        }
    }
}

/// Album metadata read from the cover; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub artist: String,
    pub title: String,
    pub year: Option<String>,
    pub genres: Vec<String>,
    pub label: Option<String>,
    pub confidence: Confidence,
}

impl IdentificationResult {
    /// Reject results that cannot key a record
    pub fn validate(self) -> Result<Self, String> {
        if self.artist.trim().is_empty() {
            return Err("identification returned an empty artist".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("identification returned an empty title".to_string());
        }
        Ok(self)
    }

    pub fn cache_key(&self) -> (String, String) {
        cache_key(&self.artist, &self.title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefinementStrategy {
    /// Search by partially read text (artist/title fragments)
    Metadata,
    /// Search by visual description of the artwork
    Visual,
}

/// Hint returned when the first identification round cannot resolve the album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRefinement {
    pub strategy: RefinementStrategy,
    pub query: String,
    pub reason: String,
    /// What the first round observed, handed back verbatim to the second round
    pub observation: serde_json::Value,
}

/// Result of one identification round
#[derive(Debug, Clone, PartialEq)]
pub enum IdentificationOutcome {
    Identified(IdentificationResult),
    NeedsRefinement(SearchRefinement),
    Unresolved(String),
}

// ============================================================================
// Enrichment
// ============================================================================

/// Closed recommendation tier attached to a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    Essential,
    Recommended,
    Skip,
    Avoid,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Essential => "Essential",
            Recommendation::Recommended => "Recommended",
            Recommendation::Skip => "Skip",
            Recommendation::Avoid => "Avoid",
        }
    }
}

impl FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "essential" => Ok(Recommendation::Essential),
            "recommended" => Ok(Recommendation::Recommended),
            "skip" => Ok(Recommendation::Skip),
            "avoid" => Ok(Recommendation::Avoid),
            "" => Err("recommendation is empty".to_string()),
            other => Err(format!("unknown recommendation '{}'", other)),
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review, score and recommendation for an identified album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub summary: String,
    pub bullets: Vec<String>,
    /// 0.0 ..= 10.0
    pub rating: f32,
    pub recommendation: Recommendation,
    pub key_tracks: Vec<String>,
}

impl EnrichmentResult {
    /// Enforce the review invariants
    ///
    /// Blank bullets and key tracks are dropped before the emptiness checks;
    /// bullets beyond [`MAX_REVIEW_BULLETS`] are truncated.
    pub fn validate(mut self) -> Result<Self, String> {
        self.summary = self.summary.trim().to_string();
        if self.summary.is_empty() {
            return Err("review summary is empty".to_string());
        }

        self.bullets.retain(|b| !b.trim().is_empty());
        if self.bullets.is_empty() {
            return Err("review has no bullets".to_string());
        }
        self.bullets.truncate(MAX_REVIEW_BULLETS);

        self.key_tracks.retain(|t| !t.trim().is_empty());
        if self.key_tracks.is_empty() {
            return Err("review has no key tracks".to_string());
        }

        if !self.rating.is_finite() || !(0.0..=10.0).contains(&self.rating) {
            return Err(format!("rating {} outside 0..=10", self.rating));
        }

        Ok(self)
    }
}

// ============================================================================
// Catalog and artwork
// ============================================================================

/// Catalog entity an identifier refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Logical album; preferred artwork anchor
    ReleaseGroup,
    /// One specific pressing
    Release,
}

impl EntityKind {
    /// URL path segment used by MusicBrainz and the Cover Art Archive
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityKind::ReleaseGroup => "release-group",
            EntityKind::Release => "release",
        }
    }
}

/// One release returned by a catalog search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCandidate {
    /// Release id
    pub id: String,
    pub title: String,
    pub artist_name: String,
    /// ISO-ish: `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub release_date: Option<String>,
    /// Two-letter release country (`XW` = worldwide)
    pub country: Option<String>,
    pub release_group_id: Option<String>,
}

/// Downloaded cover images; either field may be absent independently
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtworkBundle {
    pub high_res: Option<Vec<u8>>,
    /// Square JPEG rendered from the mid-size variant
    pub thumbnail: Option<Vec<u8>>,
}

impl ArtworkBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.high_res.is_none() && self.thumbnail.is_none()
    }
}

// ============================================================================
// Persisted record
// ============================================================================

/// Persisted album: identification + enrichment (or placeholders) + artwork + flags
///
/// `enrichment_complete` and `enrichment_failed` are only ever changed together
/// through [`AlbumRecord::apply_enrichment`], which keeps them exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub id: String,

    pub artist: String,
    pub title: String,
    pub year: Option<String>,
    pub genres: Vec<String>,
    pub label: Option<String>,
    pub confidence: Confidence,

    pub summary: String,
    pub bullets: Vec<String>,
    pub rating: Option<f32>,
    pub recommendation: Option<Recommendation>,
    pub key_tracks: Vec<String>,

    pub catalog_id: Option<String>,
    pub artwork: Option<ArtworkBundle>,

    pub enrichment_complete: bool,
    pub enrichment_failed: bool,
    pub last_enrichment_attempt: Option<DateTime<Utc>>,
    pub artwork_failed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlbumRecord {
    /// Fresh record for a completed identification, with placeholder enrichment
    ///
    /// When a record for the same album already exists its id, creation time
    /// and last attempt carry over so the commit updates that row.
    pub fn for_identification(
        identification: &IdentificationResult,
        previous: Option<&AlbumRecord>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: previous
                .map(|p| p.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            artist: identification.artist.clone(),
            title: identification.title.clone(),
            year: identification.year.clone(),
            genres: identification.genres.clone(),
            label: identification.label.clone(),
            confidence: identification.confidence,
            summary: PLACEHOLDER_SUMMARY.to_string(),
            bullets: Vec::new(),
            rating: None,
            recommendation: None,
            key_tracks: Vec::new(),
            catalog_id: None,
            artwork: None,
            enrichment_complete: false,
            enrichment_failed: false,
            last_enrichment_attempt: previous.and_then(|p| p.last_enrichment_attempt),
            artwork_failed: false,
            created_at: previous.map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        }
    }

    pub fn identification(&self) -> IdentificationResult {
        IdentificationResult {
            artist: self.artist.clone(),
            title: self.title.clone(),
            year: self.year.clone(),
            genres: self.genres.clone(),
            label: self.label.clone(),
            confidence: self.confidence,
        }
    }

    /// Stored review, available only when enrichment completed
    pub fn enrichment(&self) -> Option<EnrichmentResult> {
        if !self.enrichment_complete {
            return None;
        }
        Some(EnrichmentResult {
            summary: self.summary.clone(),
            bullets: self.bullets.clone(),
            rating: self.rating?,
            recommendation: self.recommendation?,
            key_tracks: self.key_tracks.clone(),
        })
    }

    /// Record the review branch outcome (`None` = failed)
    ///
    /// `attempted_at` is set when the review service was actually called;
    /// reusing a cached review leaves the previous attempt time in place.
    pub fn apply_enrichment(
        &mut self,
        result: Option<EnrichmentResult>,
        attempted_at: Option<DateTime<Utc>>,
    ) {
        match result {
            Some(review) => {
                self.summary = review.summary;
                self.bullets = review.bullets;
                self.rating = Some(review.rating);
                self.recommendation = Some(review.recommendation);
                self.key_tracks = review.key_tracks;
                self.enrichment_complete = true;
                self.enrichment_failed = false;
            }
            None => {
                self.summary = PLACEHOLDER_SUMMARY.to_string();
                self.bullets.clear();
                self.rating = None;
                self.recommendation = None;
                self.key_tracks.clear();
                self.enrichment_complete = false;
                self.enrichment_failed = true;
            }
        }
        if attempted_at.is_some() {
            self.last_enrichment_attempt = attempted_at;
        }
        self.updated_at = Utc::now();
    }

    /// Record the artwork branch outcome
    ///
    /// An empty bundle counts as a failure.
    pub fn apply_artwork(&mut self, catalog_id: Option<String>, artwork: Option<ArtworkBundle>) {
        self.catalog_id = catalog_id;
        self.artwork = artwork.filter(|bundle| !bundle.is_empty());
        self.artwork_failed = self.artwork.is_none();
        self.updated_at = Utc::now();
    }

    pub fn cache_key(&self) -> (String, String) {
        cache_key(&self.artist, &self.title)
    }
}

// ============================================================================
// Tests
// ============================================================================
