//! Artwork fetcher: listing → front-cover selection → downloads → thumbnail
//!
//! The id handed over by the resolver may be a release-group or a release, so
//! the release-group listing is tried first and the release listing second.
//! A kind succeeds only when its original image downloads and decodes; the
//! thumbnail is rendered from the mid-size variant, or from the original when
//! the mid-size variant is missing, fails to download or fails to decode.
//! A failed mid-size download is therefore not an artwork failure.

use super::{render_square_thumbnail, ArtworkSource, CoverArtApi, CoverImage};
use crate::types::{ArtworkBundle, EntityKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

const LISTING_ORDER: [EntityKind; 2] = [EntityKind::ReleaseGroup, EntityKind::Release];

/// Default square thumbnail edge in pixels
pub const DEFAULT_THUMBNAIL_EDGE_PX: u32 = 300;

/// Pick the front cover
///
/// Priority: approved and tagged Front, approved, tagged Front, front flag,
/// first image.
pub fn select_image(images: &[CoverImage]) -> Option<&CoverImage> {
    images
        .iter()
        .find(|i| i.is_approved() && i.is_tagged_front())
        .or_else(|| images.iter().find(|i| i.is_approved()))
        .or_else(|| images.iter().find(|i| i.is_tagged_front()))
        .or_else(|| images.iter().find(|i| i.front))
        .or_else(|| images.first())
}

pub struct ArtworkFetcher {
    api: Arc<dyn CoverArtApi>,
    thumbnail_edge_px: u32,
}

impl ArtworkFetcher {
    pub fn new(api: Arc<dyn CoverArtApi>, thumbnail_edge_px: u32) -> Self {
        Self {
            api,
            thumbnail_edge_px,
        }
    }

    async fn render_thumbnail(&self, source: Vec<u8>) -> Option<Vec<u8>> {
        let edge_px = self.thumbnail_edge_px;
        match tokio::task::spawn_blocking(move || render_square_thumbnail(&source, edge_px)).await {
            Ok(Ok(thumbnail)) => Some(thumbnail),
            Ok(Err(e)) => {
                warn!(error = %e, "Thumbnail rendering failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "Thumbnail task failed");
                None
            }
        }
    }

    /// Download the chosen image and build the bundle
    ///
    /// `None` when the original fails to download or is not a decodable image.
    async fn download_image(&self, image: &CoverImage) -> Option<ArtworkBundle> {
        let mid_size = async {
            match image.thumbnail_url.as_deref() {
                Some(url) => Some(self.api.download(url).await),
                None => None,
            }
        };
        let (high_res, mid_size) = tokio::join!(self.api.download(&image.url), mid_size);

        let high_res = match high_res {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %image.url, error = %e, "Original artwork download failed");
                return None;
            }
        };

        if let Err(e) = image::guess_format(&high_res) {
            warn!(
                url = %image.url,
                bytes = high_res.len(),
                error = %e,
                "Original artwork is not an image"
            );
            return None;
        }

        let from_mid_size = match mid_size {
            Some(Ok(bytes)) => self.render_thumbnail(bytes).await,
            Some(Err(e)) => {
                debug!(error = %e, "Mid-size download failed, rendering thumbnail from original");
                None
            }
            None => None,
        };

        // Rendering from the original doubles as the decode check for truncated bodies
        let thumbnail = match from_mid_size {
            Some(thumbnail) => thumbnail,
            None => match self.render_thumbnail(high_res.clone()).await {
                Some(thumbnail) => thumbnail,
                None => {
                    warn!(url = %image.url, "Original artwork could not be decoded");
                    return None;
                }
            },
        };

        Some(ArtworkBundle {
            high_res: Some(high_res),
            thumbnail: Some(thumbnail),
        })
    }

    async fn fetch_kind(&self, kind: EntityKind, id: &str) -> Option<ArtworkBundle> {
        let images = match self.api.get_images(kind, id).await {
            Ok(images) => images,
            Err(e) => {
                debug!(kind = ?kind, id = %id, error = %e, "Artwork listing unavailable");
                return None;
            }
        };

        let Some(image) = select_image(&images) else {
            debug!(kind = ?kind, id = %id, "Artwork listing is empty");
            return None;
        };

        self.download_image(image).await
    }
}

#[async_trait]
impl ArtworkSource for ArtworkFetcher {
    async fn fetch(&self, id: &str) -> ArtworkBundle {
        for kind in LISTING_ORDER {
            if let Some(bundle) = self.fetch_kind(kind, id).await {
                info!(kind = ?kind, id = %id, thumbnail = bundle.thumbnail.is_some(), "Fetched artwork");
                return bundle;
            }
        }

        warn!(id = %id, "No artwork could be fetched");
        ArtworkBundle::empty()
    }
}
