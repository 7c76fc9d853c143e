//! Play history repository: append-only play events
//!
//! Events are immutable once written. The same (track, played_at) pair may
//! appear for different users; dedup happens upstream via the watermark, not
//! here.

use crate::error::Result;
use crate::models::PlayEvent;
use async_trait::async_trait;
use sqlx::{query_as, QueryBuilder, SqlitePool};

/// Play history repository interface
#[async_trait]
pub trait PlayHistoryRepository: Send + Sync {
    /// Append a batch of play events. An empty batch is a no-op.
    async fn append(&self, events: &[PlayEvent]) -> Result<()>;

    /// All events for a user, oldest first
    async fn events_for_user(&self, user_id: &str) -> Result<Vec<PlayEvent>>;

    /// Count events for a user
    async fn count_for_user(&self, user_id: &str) -> Result<i64>;
}

/// SQLite implementation of PlayHistoryRepository
pub struct SqlitePlayHistoryRepository {
    pool: SqlitePool,
}

impl SqlitePlayHistoryRepository {
    /// Create a new SqlitePlayHistoryRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayHistoryRepository for SqlitePlayHistoryRepository {
    async fn append(&self, events: &[PlayEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut builder =
            QueryBuilder::new("INSERT INTO play_history (user_id, track_id, played_at_ms) ");
        builder.push_values(events, |mut b, event| {
            b.push_bind(&event.user_id)
                .push_bind(&event.track_id)
                .push_bind(event.played_at_ms);
        });
        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    async fn events_for_user(&self, user_id: &str) -> Result<Vec<PlayEvent>> {
        let events = query_as::<_, PlayEvent>(
            r#"
            SELECT user_id, track_id, played_at_ms FROM play_history
            WHERE user_id = ? ORDER BY played_at_ms ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) as count FROM play_history WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{Album, Track};
    use crate::repositories::{
        AlbumRepository, SqliteAlbumRepository, SqliteTrackRepository, SqliteUserRepository,
        TrackRepository, UserRepository,
    };

    async fn seed(pool: &SqlitePool) {
        SqliteUserRepository::new(pool.clone())
            .insert_if_missing("user-1")
            .await
            .unwrap();
        SqliteAlbumRepository::new(pool.clone())
            .insert_if_missing(&Album::new("album-1", "Album"))
            .await
            .unwrap();
        let tracks = SqliteTrackRepository::new(pool.clone());
        for id in ["track-1", "track-2"] {
            tracks
                .insert_if_missing(&Track {
                    id: id.to_string(),
                    name: id.to_string(),
                    album_id: "album-1".to_string(),
                    duration_ms: 200_000,
                    preview_url: None,
                })
                .await
                .unwrap();
        }
    }

    fn event(track_id: &str, played_at_ms: i64) -> PlayEvent {
        PlayEvent {
            user_id: "user-1".to_string(),
            track_id: track_id.to_string(),
            played_at_ms,
        }
    }

    #[tokio::test]
    async fn test_append_batch_and_read_back() {
        let pool = create_test_pool().await.unwrap();
        seed(&pool).await;
        let repo = SqlitePlayHistoryRepository::new(pool);

        repo.append(&[event("track-1", 100), event("track-2", 300), event("track-1", 200)])
            .await
            .unwrap();

        let events = repo.events_for_user("user-1").await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].played_at_ms, 100);
        assert_eq!(events[2].played_at_ms, 300);
    }

    #[tokio::test]
    async fn test_append_empty_batch_is_noop() {
        let pool = create_test_pool().await.unwrap();
        seed(&pool).await;
        let repo = SqlitePlayHistoryRepository::new(pool);

        repo.append(&[]).await.unwrap();
        assert_eq!(repo.count_for_user("user-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let pool = create_test_pool().await.unwrap();
        seed(&pool).await;
        let repo = SqlitePlayHistoryRepository::new(pool);

        // The same play recorded twice stays twice: dedup is the watermark's
        // job, not the store's.
        repo.append(&[event("track-1", 100)]).await.unwrap();
        repo.append(&[event("track-1", 100)]).await.unwrap();

        assert_eq!(repo.count_for_user("user-1").await.unwrap(), 2);
    }
}
