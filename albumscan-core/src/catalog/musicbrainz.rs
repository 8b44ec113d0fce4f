//! MusicBrainz release search + Cover Art Archive presence probe
//!
//! # API Reference
//! - Search: `GET {musicbrainz}/release?query=artist:"…" AND release:"…"&limit=N&fmt=json`
//! - Probe: `HEAD {coverartarchive}/{release|release-group}/{id}/front`
//!
//! MusicBrainz requires a descriptive User-Agent on every request. The probe
//! client does not follow redirects: a 307 to the image host already proves
//! the artwork exists, so the image itself is never transferred.

use super::{CatalogApi, CatalogError};
use crate::types::{CatalogCandidate, EntityKind};
use albumscan_common::config::CatalogConfig;
use async_trait::async_trait;
use reqwest::{header, redirect, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// MusicBrainz catalog client
pub struct MusicBrainzCatalog {
    /// Client for search requests (search timeout)
    search_client: Client,
    /// Client for artwork probes (short timeout, no redirects)
    probe_client: Client,
    musicbrainz_url: String,
    cover_art_url: String,
}

impl MusicBrainzCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let mut headers = header::HeaderMap::new();
        let user_agent = header::HeaderValue::from_str(&config.user_agent)
            .map_err(|e| CatalogError::Network(format!("Invalid user agent: {}", e)))?;
        headers.insert(header::USER_AGENT, user_agent);

        let search_client = Client::builder()
            .timeout(Duration::from_secs(config.search_timeout_secs))
            .default_headers(headers.clone())
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let probe_client = Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs))
            .redirect(redirect::Policy::none())
            .default_headers(headers)
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            search_client,
            probe_client,
            musicbrainz_url: config.musicbrainz_url.trim_end_matches('/').to_string(),
            cover_art_url: config.cover_art_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Lucene phrase query for a release search
fn search_query(artist: &str, title: &str) -> String {
    format!(
        "artist:\"{}\" AND release:\"{}\"",
        escape_phrase(artist),
        escape_phrase(title)
    )
}

fn escape_phrase(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn network_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Network(format!("request timed out: {}", err))
    } else {
        CatalogError::Network(err.to_string())
    }
}

#[async_trait]
impl CatalogApi for MusicBrainzCatalog {
    async fn search(
        &self,
        artist: &str,
        title: &str,
        limit: usize,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        let url = format!("{}/release", self.musicbrainz_url);
        let query = search_query(artist, title);
        let limit = limit.to_string();

        debug!(artist = %artist, title = %title, "Searching MusicBrainz releases");

        let response = self
            .search_client
            .get(&url)
            .query(&[("query", query.as_str()), ("limit", limit.as_str()), ("fmt", "json")])
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(CatalogError::ServiceUnavailable);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api(status.as_u16(), body));
        }

        let page: SearchResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(format!("Failed to parse MusicBrainz response: {}", e)))?;

        let candidates: Vec<CatalogCandidate> =
            page.releases.into_iter().map(CatalogCandidate::from).collect();

        debug!(
            artist = %artist,
            title = %title,
            candidates = candidates.len(),
            "MusicBrainz search complete"
        );

        Ok(candidates)
    }

    async fn has_artwork(&self, kind: EntityKind, id: &str) -> Result<bool, CatalogError> {
        let url = format!("{}/{}/{}/front", self.cover_art_url, kind.path_segment(), id);

        let response = self
            .probe_client
            .head(&url)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        debug!(kind = ?kind, id = %id, status = status.as_u16(), "Artwork probe");

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(CatalogError::ServiceUnavailable);
        }
        Ok(status.is_success() || status.is_redirection())
    }
}

// ============================================================================
// MusicBrainz API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    releases: Vec<MbRelease>,
}

#[derive(Debug, Deserialize)]
struct MbRelease {
    id: String,
    title: String,
    date: Option<String>,
    country: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MbArtistCredit>,
    #[serde(rename = "release-group")]
    release_group: Option<MbReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct MbArtistCredit {
    name: String,
    #[serde(default)]
    joinphrase: String,
}

#[derive(Debug, Deserialize)]
struct MbReleaseGroup {
    id: String,
}

impl From<MbRelease> for CatalogCandidate {
    fn from(release: MbRelease) -> Self {
        let artist_name = release
            .artist_credit
            .iter()
            .map(|credit| format!("{}{}", credit.name, credit.joinphrase))
            .collect::<String>();

        CatalogCandidate {
            id: release.id,
            title: release.title,
            artist_name,
            release_date: release.date.filter(|d| !d.is_empty()),
            country: release.country.filter(|c| !c.is_empty()),
            release_group_id: release.release_group.map(|rg| rg.id),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let catalog = MusicBrainzCatalog::new(&CatalogConfig::default());
        assert!(catalog.is_ok());
    }

    #[test]
    fn test_base_urls_trimmed() {
        let config = CatalogConfig {
            musicbrainz_url: "http://localhost:5000/ws/2/".to_string(),
            ..CatalogConfig::default()
        };
        let catalog = MusicBrainzCatalog::new(&config).unwrap();
        assert_eq!(catalog.musicbrainz_url, "http://localhost:5000/ws/2");
    }

    #[test]
    fn test_search_query_escapes_quotes() {
        assert_eq!(
            search_query("Guns N' Roses", "\"Use Your Illusion\""),
            "artist:\"Guns N' Roses\" AND release:\"\\\"Use Your Illusion\\\"\""
        );
    }

    #[test]
    fn test_release_parsing() {
        let json = r#"{
            "created": "2024-01-01T00:00:00.000Z",
            "count": 1,
            "releases": [{
                "id": "b1392450-e666-3926-a536-22c65f834433",
                "title": "OK Computer",
                "date": "1997-05-21",
                "country": "GB",
                "artist-credit": [{"name": "Radiohead", "artist": {"id": "a74b1b7f"}}],
                "release-group": {"id": "b1392450-rg", "primary-type": "Album"}
            }, {
                "id": "collab",
                "title": "Split",
                "date": "",
                "artist-credit": [
                    {"name": "Artist One", "joinphrase": " & "},
                    {"name": "Artist Two"}
                ]
            }]
        }"#;

        let page: SearchResponse = serde_json::from_str(json).unwrap();
        let candidates: Vec<CatalogCandidate> =
            page.releases.into_iter().map(CatalogCandidate::from).collect();

        assert_eq!(candidates[0].artist_name, "Radiohead");
        assert_eq!(candidates[0].country.as_deref(), Some("GB"));
        assert_eq!(candidates[0].release_group_id.as_deref(), Some("b1392450-rg"));

        assert_eq!(candidates[1].artist_name, "Artist One & Artist Two");
        assert_eq!(candidates[1].release_date, None);
        assert_eq!(candidates[1].release_group_id, None);
    }

    #[test]
    fn test_empty_search_page() {
        let page: SearchResponse = serde_json::from_str(r#"{"count": 0}"#).unwrap();
        assert!(page.releases.is_empty());
    }

    // Live MusicBrainz queries are not exercised here: the resolver is tested
    // against scripted CatalogApi fakes in tests/catalog_resolver_tests.rs
}
