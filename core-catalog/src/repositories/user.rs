//! User repository: user rows and the per-user sync watermark
//!
//! The watermark (`last_synced_at_ms`) is the played-at timestamp of the most
//! recent ingested play event. The update is guarded in SQL so the watermark
//! can never move backwards, whatever the caller passes.

use crate::error::Result;
use crate::models::UserSyncState;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// User repository interface
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user with its sync state
    async fn find(&self, id: &str) -> Result<Option<UserSyncState>>;

    /// Create the user row unless it already exists
    ///
    /// # Returns
    /// - `Ok(true)` if the row was inserted
    /// - `Ok(false)` if the user already existed
    async fn insert_if_missing(&self, id: &str) -> Result<bool>;

    /// Advance the watermark to `synced_at_ms`.
    ///
    /// The update only applies when it does not move the watermark backwards.
    ///
    /// # Returns
    /// - `Ok(true)` if the watermark advanced
    /// - `Ok(false)` if the stored watermark was already newer (no-op)
    async fn update_last_synced(&self, id: &str, synced_at_ms: i64) -> Result<bool>;
}

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Create a new SqliteUserRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find(&self, id: &str) -> Result<Option<UserSyncState>> {
        let user = query_as::<_, UserSyncState>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn insert_if_missing(&self, id: &str) -> Result<bool> {
        let result = query("INSERT OR IGNORE INTO users (id) VALUES (?)")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_last_synced(&self, id: &str, synced_at_ms: i64) -> Result<bool> {
        let result = query(
            r#"
            UPDATE users SET last_synced_at_ms = ?
            WHERE id = ? AND (last_synced_at_ms IS NULL OR last_synced_at_ms <= ?)
            "#,
        )
        .bind(synced_at_ms)
        .bind(id)
        .bind(synced_at_ms)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
