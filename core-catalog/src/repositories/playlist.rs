//! Playlist repository trait and implementation
//!
//! Top-list definitions are written by the (external) recompute job; this
//! repository reads them for rotation and owns the remote playlist mappings.
//! The selection queries encode the per-(group, name) binding states:
//!
//! - *creatable*: a current definition whose (group, name) pair has no remote
//!   mapping at all — rotation Phase A creates a remote playlist for it
//! - *stale*: a mapped definition that is no longer current — rotation
//!   Phase B rebinds its remote playlist to the current sibling

use crate::error::Result;
use crate::models::{MappedDefinition, PlaylistDefinition, PlaylistItem};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Playlist repository interface for rotation and setup
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Insert a top-list definition
    async fn insert_definition(&self, definition: &PlaylistDefinition) -> Result<()>;

    /// Insert a scored item for a definition
    async fn insert_item(&self, item: &PlaylistItem) -> Result<()>;

    /// Find a definition by id
    async fn find_definition(&self, id: &str) -> Result<Option<PlaylistDefinition>>;

    /// Current-flagged definitions with no remote mapping, for which no
    /// sibling definition sharing (group_name, name) is mapped either
    async fn creatable_definitions(&self) -> Result<Vec<PlaylistDefinition>>;

    /// Remote-mapped definitions that are flagged outdated
    async fn stale_mappings(&self) -> Result<Vec<MappedDefinition>>;

    /// All remote-mapped definitions (invariant audits and tests)
    async fn mapped_definitions(&self) -> Result<Vec<MappedDefinition>>;

    /// The current-flagged sibling for a (group_name, name) pair
    async fn current_sibling(&self, group_name: &str, name: &str)
        -> Result<Option<PlaylistDefinition>>;

    /// Items of a definition, highest score first
    async fn items(&self, definition_id: &str) -> Result<Vec<PlaylistItem>>;

    /// Bind a remote playlist to a definition
    async fn map_remote(&self, definition_id: &str, remote_id: &str) -> Result<()>;

    /// Rebind an existing remote playlist to a different definition. The
    /// remote playlist id is stable across rotations; only the definition it
    /// is bound to changes.
    async fn repoint_remote(&self, remote_id: &str, definition_id: &str) -> Result<()>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    /// Create a new SqlitePlaylistRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn insert_definition(&self, definition: &PlaylistDefinition) -> Result<()> {
        query(
            r#"
            INSERT INTO playlist_definitions (id, group_name, name, is_current)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&definition.id)
        .bind(&definition.group_name)
        .bind(&definition.name)
        .bind(definition.is_current)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_item(&self, item: &PlaylistItem) -> Result<()> {
        query("INSERT INTO playlist_items (definition_id, track_id, score) VALUES (?, ?, ?)")
            .bind(&item.definition_id)
            .bind(&item.track_id)
            .bind(item.score)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_definition(&self, id: &str) -> Result<Option<PlaylistDefinition>> {
        let definition =
            query_as::<_, PlaylistDefinition>("SELECT * FROM playlist_definitions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(definition)
    }

    async fn creatable_definitions(&self) -> Result<Vec<PlaylistDefinition>> {
        let definitions = query_as::<_, PlaylistDefinition>(
            r#"
            SELECT d.* FROM playlist_definitions d
            WHERE d.is_current = 1
              AND NOT EXISTS (
                SELECT 1 FROM remote_playlists r
                JOIN playlist_definitions s ON s.id = r.definition_id
                WHERE s.group_name = d.group_name AND s.name = d.name
              )
            ORDER BY d.group_name, d.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(definitions)
    }

    async fn stale_mappings(&self) -> Result<Vec<MappedDefinition>> {
        let mappings = query_as::<_, MappedDefinition>(
            r#"
            SELECT r.remote_id, d.id AS definition_id, d.group_name, d.name, d.is_current
            FROM remote_playlists r
            JOIN playlist_definitions d ON d.id = r.definition_id
            WHERE d.is_current = 0
            ORDER BY d.group_name, d.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(mappings)
    }

    async fn mapped_definitions(&self) -> Result<Vec<MappedDefinition>> {
        let mappings = query_as::<_, MappedDefinition>(
            r#"
            SELECT r.remote_id, d.id AS definition_id, d.group_name, d.name, d.is_current
            FROM remote_playlists r
            JOIN playlist_definitions d ON d.id = r.definition_id
            ORDER BY d.group_name, d.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(mappings)
    }

    async fn current_sibling(
        &self,
        group_name: &str,
        name: &str,
    ) -> Result<Option<PlaylistDefinition>> {
        let definition = query_as::<_, PlaylistDefinition>(
            r#"
            SELECT * FROM playlist_definitions
            WHERE group_name = ? AND name = ? AND is_current = 1
            LIMIT 1
            "#,
        )
        .bind(group_name)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(definition)
    }

    async fn items(&self, definition_id: &str) -> Result<Vec<PlaylistItem>> {
        let items = query_as::<_, PlaylistItem>(
            "SELECT * FROM playlist_items WHERE definition_id = ? ORDER BY score DESC",
        )
        .bind(definition_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn map_remote(&self, definition_id: &str, remote_id: &str) -> Result<()> {
        query("INSERT INTO remote_playlists (remote_id, definition_id) VALUES (?, ?)")
            .bind(remote_id)
            .bind(definition_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn repoint_remote(&self, remote_id: &str, definition_id: &str) -> Result<()> {
        query("UPDATE remote_playlists SET definition_id = ? WHERE remote_id = ?")
            .bind(definition_id)
            .bind(remote_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
