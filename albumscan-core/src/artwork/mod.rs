//! Cover artwork retrieval
//!
//! [`CoverArtApi`] lists the images attached to a release or release-group and
//! downloads bytes; [`ArtworkFetcher`] picks the front cover, downloads the
//! original plus the mid-size variant and renders the square thumbnail.
//! Artwork is best-effort: [`ArtworkSource::fetch`] never fails, it returns an
//! empty [`ArtworkBundle`] instead.

pub mod cover_art_archive;
pub mod fetcher;
pub mod thumbnail;

pub use cover_art_archive::CoverArtArchive;
pub use fetcher::{select_image, ArtworkFetcher};
pub use thumbnail::render_square_thumbnail;

use crate::types::{ArtworkBundle, EntityKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArtworkError {
    /// No artwork listing for this id
    #[error("No artwork found")]
    NotFound,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: HTTP {0}")]
    Api(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Image error: {0}")]
    Image(String),
}

/// One image in an artwork listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverImage {
    /// Flagged as the front cover by the archive
    pub front: bool,
    /// Community approval; `None` when the archive does not say
    pub approved: Option<bool>,
    /// Free-form tags such as `Front`, `Back`, `Booklet`
    pub types: Vec<String>,
    /// Full-resolution original
    pub url: String,
    /// Mid-size variant, when the archive provides one
    pub thumbnail_url: Option<String>,
}

impl CoverImage {
    pub fn is_tagged_front(&self) -> bool {
        self.types.iter().any(|t| t.eq_ignore_ascii_case("front"))
    }

    pub fn is_approved(&self) -> bool {
        self.approved.unwrap_or(false)
    }
}

/// External artwork archive
#[async_trait]
pub trait CoverArtApi: Send + Sync {
    /// List the images for a release or release-group
    async fn get_images(&self, kind: EntityKind, id: &str) -> Result<Vec<CoverImage>, ArtworkError>;

    /// Download raw image bytes
    async fn download(&self, url: &str) -> Result<Vec<u8>, ArtworkError>;
}

/// Resolve a catalog id to cover images
#[async_trait]
pub trait ArtworkSource: Send + Sync {
    /// Never fails; any failure yields [`ArtworkBundle::empty`]
    async fn fetch(&self, id: &str) -> ArtworkBundle;
}
