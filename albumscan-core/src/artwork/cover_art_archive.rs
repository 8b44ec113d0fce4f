//! Cover Art Archive client
//!
//! # API Reference
//! - Listing: `GET {base}/{release|release-group}/{id}` → `{"images": [...]}`
//! - 404 means the entity has no artwork at all
//!
//! Image URLs redirect to the storage host, so downloads follow redirects and
//! use the transport's default timeout.

use super::{ArtworkError, CoverArtApi, CoverImage};
use crate::types::EntityKind;
use albumscan_common::config::ArtworkConfig;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Thumbnail sizes tried for the mid-size variant, preferred first
const MID_SIZE_KEYS: [&str; 3] = ["500", "large", "1200"];

pub struct CoverArtArchive {
    http_client: Client,
    base_url: String,
}

impl CoverArtArchive {
    pub fn new(config: &ArtworkConfig) -> Result<Self, ArtworkError> {
        let http_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ArtworkError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.cover_art_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CoverArtApi for CoverArtArchive {
    async fn get_images(&self, kind: EntityKind, id: &str) -> Result<Vec<CoverImage>, ArtworkError> {
        let url = format!("{}/{}/{}", self.base_url, kind.path_segment(), id);

        let response = self
            .http_client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ArtworkError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ArtworkError::NotFound),
            status if !status.is_success() => return Err(ArtworkError::Api(status.as_u16())),
            _ => {}
        }

        let listing: ListingResponse = response
            .json()
            .await
            .map_err(|e| ArtworkError::Parse(e.to_string()))?;

        debug!(kind = ?kind, id = %id, images = listing.images.len(), "Fetched artwork listing");

        Ok(listing.images.into_iter().map(CoverImage::from).collect())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ArtworkError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ArtworkError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtworkError::Api(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ArtworkError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ============================================================================
// Cover Art Archive Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    images: Vec<CaaImage>,
}

#[derive(Debug, Deserialize)]
struct CaaImage {
    #[serde(default)]
    front: bool,
    approved: Option<bool>,
    #[serde(default)]
    types: Vec<String>,
    image: String,
    #[serde(default)]
    thumbnails: HashMap<String, String>,
}

impl From<CaaImage> for CoverImage {
    fn from(image: CaaImage) -> Self {
        let thumbnail_url = MID_SIZE_KEYS
            .iter()
            .find_map(|key| image.thumbnails.get(*key).cloned());

        CoverImage {
            front: image.front,
            approved: image.approved,
            types: image.types,
            url: image.image,
            thumbnail_url,
        }
    }
}
