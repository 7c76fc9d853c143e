//! Album repository trait and implementation

use crate::error::{CatalogError, Result};
use crate::models::Album;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Album repository interface for data access operations
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    /// Find an album by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>>;

    /// Insert an album unless a row with the same id already exists.
    ///
    /// # Returns
    /// - `Ok(true)` if the row was inserted
    /// - `Ok(false)` if an album with this id already existed
    async fn insert_if_missing(&self, album: &Album) -> Result<bool>;

    /// Count total albums
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of AlbumRepository
pub struct SqliteAlbumRepository {
    pool: SqlitePool,
}

impl SqliteAlbumRepository {
    /// Create a new SqliteAlbumRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>> {
        let album = query_as::<_, Album>("SELECT * FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(album)
    }

    async fn insert_if_missing(&self, album: &Album) -> Result<bool> {
        album.validate().map_err(|e| CatalogError::InvalidInput {
            field: "Album".to_string(),
            message: e,
        })?;

        let result = query(
            "INSERT OR IGNORE INTO albums (id, name, image_url, release_date) VALUES (?, ?, ?, ?)",
        )
        .bind(&album.id)
        .bind(&album.name)
        .bind(&album.image_url)
        .bind(&album.release_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) as count FROM albums")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}
