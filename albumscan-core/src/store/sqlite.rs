//! SQLite album store
//!
//! One row per album in `album_records`. List fields are JSON text, artwork is
//! two BLOB columns, timestamps are unix milliseconds.

use super::AlbumStore;
use crate::types::{cache_key, AlbumRecord, ArtworkBundle, Confidence, Recommendation};
use albumscan_common::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::debug;

const SELECT_COLUMNS: &str = r#"
    SELECT id, artist, title, year, genres, label, confidence,
           summary, bullets, rating, recommendation, key_tracks,
           catalog_id, artwork_high_res, artwork_thumbnail,
           enrichment_complete, enrichment_failed, last_enrichment_attempt, artwork_failed,
           created_at, updated_at
    FROM album_records
"#;

pub struct SqliteAlbumStore {
    pool: SqlitePool,
}

impl SqliteAlbumStore {
    /// Wrap a pool whose schema is already applied (see `albumscan_common::db`)
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Internal(format!("Invalid timestamp: {}", ms)))
}

fn row_to_record(row: &SqliteRow) -> Result<AlbumRecord> {
    let genres: String = row.get("genres");
    let bullets: String = row.get("bullets");
    let key_tracks: String = row.get("key_tracks");

    let confidence: String = row.get("confidence");
    let confidence = Confidence::from_str(&confidence).map_err(Error::Internal)?;

    let recommendation: Option<String> = row.get("recommendation");
    let recommendation = recommendation
        .map(|r| Recommendation::from_str(&r))
        .transpose()
        .map_err(Error::Internal)?;

    let high_res: Option<Vec<u8>> = row.get("artwork_high_res");
    let thumbnail: Option<Vec<u8>> = row.get("artwork_thumbnail");
    let artwork = Some(ArtworkBundle { high_res, thumbnail }).filter(|bundle| !bundle.is_empty());

    let rating: Option<f64> = row.get("rating");
    let last_attempt: Option<i64> = row.get("last_enrichment_attempt");

    Ok(AlbumRecord {
        id: row.get("id"),
        artist: row.get("artist"),
        title: row.get("title"),
        year: row.get("year"),
        genres: serde_json::from_str(&genres)?,
        label: row.get("label"),
        confidence,
        summary: row.get("summary"),
        bullets: serde_json::from_str(&bullets)?,
        rating: rating.map(|r| r as f32),
        recommendation,
        key_tracks: serde_json::from_str(&key_tracks)?,
        catalog_id: row.get("catalog_id"),
        artwork,
        enrichment_complete: row.get("enrichment_complete"),
        enrichment_failed: row.get("enrichment_failed"),
        last_enrichment_attempt: last_attempt.map(from_millis).transpose()?,
        artwork_failed: row.get("artwork_failed"),
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

#[async_trait]
impl AlbumStore for SqliteAlbumStore {
    async fn find_by_artist_title(&self, artist: &str, title: &str) -> Result<Option<AlbumRecord>> {
        let (artist_key, title_key) = cache_key(artist, title);

        let row = sqlx::query(&format!(
            "{} WHERE artist_key = ? AND title_key = ?",
            SELECT_COLUMNS
        ))
        .bind(&artist_key)
        .bind(&title_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn save(&self, record: &AlbumRecord) -> Result<String> {
        if record.enrichment_complete && record.enrichment_failed {
            return Err(Error::InvalidInput(
                "enrichment cannot be both complete and failed".to_string(),
            ));
        }

        let (artist_key, title_key) = record.cache_key();
        let (high_res, thumbnail) = match &record.artwork {
            Some(bundle) => (bundle.high_res.as_deref(), bundle.thumbnail.as_deref()),
            None => (None, None),
        };

        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO album_records (
                id, artist, title, artist_key, title_key, year, genres, label, confidence,
                summary, bullets, rating, recommendation, key_tracks,
                catalog_id, artwork_high_res, artwork_thumbnail,
                enrichment_complete, enrichment_failed, last_enrichment_attempt, artwork_failed,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(artist_key, title_key) DO UPDATE SET
                artist = excluded.artist,
                title = excluded.title,
                year = excluded.year,
                genres = excluded.genres,
                label = excluded.label,
                confidence = excluded.confidence,
                summary = excluded.summary,
                bullets = excluded.bullets,
                rating = excluded.rating,
                recommendation = excluded.recommendation,
                key_tracks = excluded.key_tracks,
                catalog_id = excluded.catalog_id,
                artwork_high_res = excluded.artwork_high_res,
                artwork_thumbnail = excluded.artwork_thumbnail,
                enrichment_complete = excluded.enrichment_complete,
                enrichment_failed = excluded.enrichment_failed,
                last_enrichment_attempt = excluded.last_enrichment_attempt,
                artwork_failed = excluded.artwork_failed,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&record.id)
        .bind(&record.artist)
        .bind(&record.title)
        .bind(&artist_key)
        .bind(&title_key)
        .bind(&record.year)
        .bind(serde_json::to_string(&record.genres)?)
        .bind(&record.label)
        .bind(record.confidence.as_str())
        .bind(&record.summary)
        .bind(serde_json::to_string(&record.bullets)?)
        .bind(record.rating.map(f64::from))
        .bind(record.recommendation.map(|r| r.as_str()))
        .bind(serde_json::to_string(&record.key_tracks)?)
        .bind(&record.catalog_id)
        .bind(high_res)
        .bind(thumbnail)
        .bind(record.enrichment_complete)
        .bind(record.enrichment_failed)
        .bind(record.last_enrichment_attempt.map(to_millis))
        .bind(record.artwork_failed)
        .bind(to_millis(record.created_at))
        .bind(to_millis(record.updated_at))
        .fetch_one(&self.pool)
        .await?;

        debug!(record_id = %id, artist = %record.artist, title = %record.title, "Saved album record");
        Ok(id)
    }

    async fn list_retry_candidates(
        &self,
        attempted_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AlbumRecord>> {
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE (enrichment_failed = 1 OR artwork_failed = 1)
              AND (last_enrichment_attempt IS NULL OR last_enrichment_attempt < ?)
            ORDER BY COALESCE(last_enrichment_attempt, 0) ASC, created_at ASC
            LIMIT ?
            "#,
            SELECT_COLUMNS
        ))
        .bind(to_millis(attempted_before))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnrichmentResult, IdentificationResult};
    use albumscan_common::db::init_memory_database;
    use chrono::Duration;

    fn identification(artist: &str, title: &str) -> IdentificationResult {
        IdentificationResult {
            artist: artist.to_string(),
            title: title.to_string(),
            year: Some("1997".to_string()),
            genres: vec!["Alternative Rock".to_string(), "Art Rock".to_string()],
            label: Some("Parlophone".to_string()),
            confidence: Confidence::High,
        }
    }

    fn review() -> EnrichmentResult {
        EnrichmentResult {
            summary: "A landmark record.".to_string(),
            bullets: vec!["Dense".to_string(), "Paranoid".to_string(), "Influential".to_string()],
            rating: 9.5,
            recommendation: Recommendation::Essential,
            key_tracks: vec!["Airbag".to_string(), "Let Down".to_string()],
        }
    }

    async fn store() -> SqliteAlbumStore {
        SqliteAlbumStore::new(init_memory_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = store().await;
        let mut record = AlbumRecord::for_identification(&identification("Radiohead", "OK Computer"), None);
        record.apply_enrichment(Some(review()), Some(Utc::now()));
        record.apply_artwork(
            Some("rg-1".to_string()),
            Some(ArtworkBundle {
                high_res: Some(vec![1, 2, 3]),
                thumbnail: None,
            }),
        );

        let id = store.save(&record).await.unwrap();
        assert_eq!(id, record.id);

        let loaded = store
            .find_by_artist_title("radiohead", "  OK COMPUTER ")
            .await
            .unwrap()
            .expect("record should be found case-insensitively");

        assert_eq!(loaded.genres, record.genres);
        assert_eq!(loaded.enrichment(), Some(review()));
        assert_eq!(loaded.catalog_id.as_deref(), Some("rg-1"));
        assert_eq!(loaded.artwork.unwrap().high_res, Some(vec![1, 2, 3]));
        assert!(!loaded.artwork_failed);
        assert_eq!(
            loaded.last_enrichment_attempt.map(|t| t.timestamp_millis()),
            record.last_enrichment_attempt.map(|t| t.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_upsert_keeps_existing_id() {
        let store = store().await;
        let first = AlbumRecord::for_identification(&identification("Radiohead", "OK Computer"), None);
        let first_id = store.save(&first).await.unwrap();

        // Different id, same album in different case
        let mut second = AlbumRecord::for_identification(&identification("RADIOHEAD", "ok computer"), None);
        second.apply_enrichment(Some(review()), Some(Utc::now()));
        let second_id = store.save(&second).await.unwrap();

        assert_eq!(second_id, first_id);
        let loaded = store.find_by_artist_title("Radiohead", "OK Computer").await.unwrap().unwrap();
        assert_eq!(loaded.id, first_id);
        assert!(loaded.enrichment_complete);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album_records")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let store = store().await;
        assert!(store.find_by_artist_title("Nobody", "Nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conflicting_flags_rejected() {
        let store = store().await;
        let mut record = AlbumRecord::for_identification(&identification("Radiohead", "Kid A"), None);
        record.enrichment_complete = true;
        record.enrichment_failed = true;

        assert!(matches!(store.save(&record).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_retry_candidates_respect_cutoff_and_order() {
        let store = store().await;
        let now = Utc::now();

        let mut stale = AlbumRecord::for_identification(&identification("Radiohead", "Kid A"), None);
        stale.apply_enrichment(None, Some(now - Duration::hours(3)));
        store.save(&stale).await.unwrap();

        let mut older = AlbumRecord::for_identification(&identification("Radiohead", "Amnesiac"), None);
        older.apply_enrichment(None, Some(now - Duration::hours(5)));
        store.save(&older).await.unwrap();

        let mut recent = AlbumRecord::for_identification(&identification("Radiohead", "Hail to the Thief"), None);
        recent.apply_enrichment(None, Some(now));
        store.save(&recent).await.unwrap();

        let mut healthy = AlbumRecord::for_identification(&identification("Radiohead", "OK Computer"), None);
        healthy.apply_enrichment(Some(review()), Some(now - Duration::hours(9)));
        healthy.apply_artwork(
            None,
            Some(ArtworkBundle {
                high_res: Some(vec![1]),
                thumbnail: Some(vec![2]),
            }),
        );
        store.save(&healthy).await.unwrap();

        let candidates = store
            .list_retry_candidates(now - Duration::hours(1), 10)
            .await
            .unwrap();
        let titles: Vec<&str> = candidates.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Amnesiac", "Kid A"]);

        let limited = store.list_retry_candidates(now - Duration::hours(1), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
