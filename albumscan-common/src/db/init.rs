//! Database initialization
//!
//! Opens (creating if needed) the SQLite file backing the album store and
//! applies the schema. Schema creation is idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open the database at `db_path`, creating file, parent directory and schema as needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the cache lookup of one scan proceed while another commits
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_album_records_table(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with schema applied
///
/// Each `:memory:` connection is a separate database, so the pool is capped at one.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    create_album_records_table(&pool).await?;
    Ok(pool)
}

/// Persisted album records
///
/// `artist_key`/`title_key` hold the trimmed, lower-cased pair used for the
/// case-insensitive cache lookup; the pair is unique so each album has one row.
pub async fn create_album_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS album_records (
            id TEXT PRIMARY KEY,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            artist_key TEXT NOT NULL,
            title_key TEXT NOT NULL,
            year TEXT,
            genres TEXT NOT NULL DEFAULT '[]',
            label TEXT,
            confidence TEXT NOT NULL,
            summary TEXT NOT NULL,
            bullets TEXT NOT NULL DEFAULT '[]',
            rating REAL,
            recommendation TEXT,
            key_tracks TEXT NOT NULL DEFAULT '[]',
            catalog_id TEXT,
            artwork_high_res BLOB,
            artwork_thumbnail BLOB,
            enrichment_complete INTEGER NOT NULL DEFAULT 0,
            enrichment_failed INTEGER NOT NULL DEFAULT 0,
            last_enrichment_attempt INTEGER,
            artwork_failed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK (NOT (enrichment_complete = 1 AND enrichment_failed = 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_album_records_key ON album_records(artist_key, title_key)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_album_records_retry ON album_records(enrichment_failed, artwork_failed, last_enrichment_attempt)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
