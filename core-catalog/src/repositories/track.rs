//! Track repository trait and implementation
//!
//! Tracks carry their ordered artist links in a separate `track_artists`
//! table; `position` preserves the source-provided artist order. Track and
//! link writes are separate statements (no cross-entity transaction), so a
//! crash can leave a track without links — `ids_without_artists` exists to
//! find those rows for repair.

use crate::error::{CatalogError, Result};
use crate::models::{Track, TrackArtist};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Find a track by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>>;

    /// Insert a track unless a row with the same id already exists.
    ///
    /// # Returns
    /// - `Ok(true)` if the row was inserted
    /// - `Ok(false)` if a track with this id already existed
    async fn insert_if_missing(&self, track: &Track) -> Result<bool>;

    /// Write the ordered artist links for a track. `artist_ids` is the
    /// source-provided order; positions are assigned 0-based from it.
    /// Existing links for the same (track, artist) pair are left untouched.
    async fn link_artists(&self, track_id: &str, artist_ids: &[String]) -> Result<()>;

    /// Artist links for a track, in recorded source order
    async fn artist_links(&self, track_id: &str) -> Result<Vec<TrackArtist>>;

    /// Ids of tracks that have no artist links at all (partially linked
    /// tracks left behind by a crash between track and link writes)
    async fn ids_without_artists(&self) -> Result<Vec<String>>;

    /// Count total tracks
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    /// Create a new SqliteTrackRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn insert_if_missing(&self, track: &Track) -> Result<bool> {
        track.validate().map_err(|e| CatalogError::InvalidInput {
            field: "Track".to_string(),
            message: e,
        })?;

        let result = query(
            r#"
            INSERT OR IGNORE INTO tracks (id, name, album_id, duration_ms, preview_url)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&track.id)
        .bind(&track.name)
        .bind(&track.album_id)
        .bind(track.duration_ms)
        .bind(&track.preview_url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn link_artists(&self, track_id: &str, artist_ids: &[String]) -> Result<()> {
        for (position, artist_id) in artist_ids.iter().enumerate() {
            query(
                r#"
                INSERT OR IGNORE INTO track_artists (track_id, artist_id, position)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(track_id)
            .bind(artist_id)
            .bind(position as i64)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn artist_links(&self, track_id: &str) -> Result<Vec<TrackArtist>> {
        let links = query_as::<_, TrackArtist>(
            "SELECT * FROM track_artists WHERE track_id = ? ORDER BY position ASC",
        )
        .bind(track_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    async fn ids_without_artists(&self) -> Result<Vec<String>> {
        let ids = query_as::<_, (String,)>(
            r#"
            SELECT t.id FROM tracks t
            WHERE NOT EXISTS (SELECT 1 FROM track_artists ta WHERE ta.track_id = t.id)
            ORDER BY t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(|(id,)| id).collect())?;

        Ok(ids)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) as count FROM tracks")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}
