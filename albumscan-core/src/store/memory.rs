//! In-process album store
//!
//! Same semantics as the SQLite store; used by tests and by embedders that
//! do not need persistence across restarts.

use super::{is_retry_candidate, AlbumStore};
use crate::types::{cache_key, AlbumRecord};
use albumscan_common::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryAlbumStore {
    records: RwLock<HashMap<(String, String), AlbumRecord>>,
}

impl MemoryAlbumStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AlbumStore for MemoryAlbumStore {
    async fn find_by_artist_title(&self, artist: &str, title: &str) -> Result<Option<AlbumRecord>> {
        Ok(self.records.read().await.get(&cache_key(artist, title)).cloned())
    }

    async fn save(&self, record: &AlbumRecord) -> Result<String> {
        if record.enrichment_complete && record.enrichment_failed {
            return Err(Error::InvalidInput(
                "enrichment cannot be both complete and failed".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        let mut stored = record.clone();
        if let Some(existing) = records.get(&record.cache_key()) {
            stored.id = existing.id.clone();
            stored.created_at = existing.created_at;
        }

        let id = stored.id.clone();
        records.insert(record.cache_key(), stored);
        Ok(id)
    }

    async fn list_retry_candidates(
        &self,
        attempted_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AlbumRecord>> {
        let records = self.records.read().await;
        let mut candidates: Vec<AlbumRecord> = records
            .values()
            .filter(|r| is_retry_candidate(r, attempted_before))
            .cloned()
            .collect();

        candidates.sort_by_key(|r| {
            (
                r.last_enrichment_attempt.map_or(0, |t| t.timestamp_millis()),
                r.created_at,
            )
        });
        candidates.truncate(limit);
        Ok(candidates)
    }
}
