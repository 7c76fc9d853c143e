//! Artist repository trait and implementation

use crate::error::{CatalogError, Result};
use crate::models::Artist;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Artist repository interface for data access operations
#[async_trait]
pub trait ArtistRepository: Send + Sync {
    /// Find an artist by its ID
    ///
    /// # Returns
    /// - `Ok(Some(artist))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: &str) -> Result<Option<Artist>>;

    /// Insert an artist unless a row with the same id already exists.
    ///
    /// # Returns
    /// - `Ok(true)` if the row was inserted
    /// - `Ok(false)` if an artist with this id already existed (the existing
    ///   row is left untouched)
    async fn insert_if_missing(&self, artist: &Artist) -> Result<bool>;

    /// Artists whose image has not been backfilled yet
    async fn without_image(&self) -> Result<Vec<Artist>>;

    /// Backfill the image URL for an artist
    ///
    /// # Errors
    /// Returns `CatalogError::NotFound` if the artist does not exist
    async fn update_image(&self, id: &str, image_url: &str) -> Result<()>;

    /// Count total artists
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of ArtistRepository
pub struct SqliteArtistRepository {
    pool: SqlitePool,
}

impl SqliteArtistRepository {
    /// Create a new SqliteArtistRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtistRepository for SqliteArtistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Artist>> {
        let artist = query_as::<_, Artist>("SELECT * FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(artist)
    }

    async fn insert_if_missing(&self, artist: &Artist) -> Result<bool> {
        artist.validate().map_err(|e| CatalogError::InvalidInput {
            field: "Artist".to_string(),
            message: e,
        })?;

        let result = query("INSERT OR IGNORE INTO artists (id, name, image_url) VALUES (?, ?, ?)")
            .bind(&artist.id)
            .bind(&artist.name)
            .bind(&artist.image_url)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn without_image(&self) -> Result<Vec<Artist>> {
        let artists =
            query_as::<_, Artist>("SELECT * FROM artists WHERE image_url IS NULL ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(artists)
    }

    async fn update_image(&self, id: &str, image_url: &str) -> Result<()> {
        let result = query("UPDATE artists SET image_url = ? WHERE id = ?")
            .bind(image_url)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound {
                entity_type: "Artist".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) as count FROM artists")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}
