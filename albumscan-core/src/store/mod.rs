//! Durable album storage
//!
//! The orchestrator performs exactly one lookup and one save per scan, so the
//! store only needs keyed lookup and a whole-record upsert. Both
//! implementations key records by the trimmed, lower-cased (artist, title).

pub mod memory;
pub mod sqlite;

pub use memory::MemoryAlbumStore;
pub use sqlite::SqliteAlbumStore;

use crate::types::AlbumRecord;
use albumscan_common::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait AlbumStore: Send + Sync {
    /// Case-insensitive lookup by (artist, title)
    async fn find_by_artist_title(&self, artist: &str, title: &str) -> Result<Option<AlbumRecord>>;

    /// Insert or replace the record for this (artist, title); returns the stored id
    ///
    /// When a row for the same album already exists its id and creation time
    /// are kept, whatever `record.id` says.
    async fn save(&self, record: &AlbumRecord) -> Result<String>;

    /// Records with a failed review or artwork whose last enrichment attempt
    /// is older than `attempted_before` (or never happened), oldest first
    async fn list_retry_candidates(
        &self,
        attempted_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AlbumRecord>>;
}

/// Shared retry-candidate predicate
pub(crate) fn is_retry_candidate(record: &AlbumRecord, attempted_before: DateTime<Utc>) -> bool {
    (record.enrichment_failed || record.artwork_failed)
        && record
            .last_enrichment_attempt
            .map_or(true, |attempt| attempt < attempted_before)
}
