//! Domain models for the catalog and listener history
//!
//! Rows map 1:1 onto the migration schema. Catalog ids (tracks, albums,
//! artists) are the streaming service's opaque identifiers, created at most
//! once and never rewritten; the only later mutation is backfilling nullable
//! metadata (artist image). Timestamps are Unix milliseconds.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Artist catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Artist {
    /// Service-assigned identifier
    pub id: String,
    /// Artist name
    pub name: String,
    /// Largest available artist image, backfilled after first sight
    pub image_url: Option<String>,
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Artist id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Artist name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Album catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Album {
    /// Service-assigned identifier
    pub id: String,
    /// Album name
    pub name: String,
    /// Largest available cover image
    pub image_url: Option<String>,
    /// Release date as reported by the service (precision varies)
    pub release_date: Option<String>,
}

impl Album {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: None,
            release_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Album id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Album name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Track catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    /// Service-assigned identifier
    pub id: String,
    /// Track title
    pub name: String,
    /// Album reference
    pub album_id: String,
    /// Duration in milliseconds
    pub duration_ms: i64,
    /// Preview clip URL when the service provides one
    pub preview_url: Option<String>,
}

impl Track {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Track name cannot be empty".to_string());
        }
        if self.album_id.trim().is_empty() {
            return Err("Track album_id cannot be empty".to_string());
        }
        if self.duration_ms < 0 {
            return Err("Track duration cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Ordered track-artist link. `position` preserves the source-provided
/// artist order (0-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TrackArtist {
    pub track_id: String,
    pub artist_id: String,
    pub position: i64,
}

/// Per-user sync state; `last_synced_at_ms` is the ingest watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserSyncState {
    pub id: String,
    pub last_synced_at_ms: Option<i64>,
}

/// A single play event. Append-only; duplicates across users are permitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlayEvent {
    pub user_id: String,
    pub track_id: String,
    pub played_at_ms: i64,
}

/// A logical top-list definition. Several definitions may share
/// (group_name, name) over time: exactly one current, the rest outdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlaylistDefinition {
    pub id: String,
    pub group_name: String,
    pub name: String,
    pub is_current: bool,
}

impl PlaylistDefinition {
    pub fn new(group_name: impl Into<String>, name: impl Into<String>, is_current: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group_name: group_name.into(),
            name: name.into(),
            is_current,
        }
    }
}

/// Scored playlist membership; read-only for rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlaylistItem {
    pub definition_id: String,
    pub track_id: String,
    pub score: f64,
}

/// A remote-mapped definition: the join of `remote_playlists` with its
/// current binding. Used to select rotation work and to audit the
/// one-mapping-per-pair invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MappedDefinition {
    pub remote_id: String,
    pub definition_id: String,
    pub group_name: String,
    pub name: String,
    pub is_current: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_validation() {
        let artist = Artist::new("artist-1", "Boards of Canada");
        assert!(artist.validate().is_ok());

        let blank = Artist::new("artist-2", "   ");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_track_validation() {
        let track = Track {
            id: "track-1".to_string(),
            name: "Roygbiv".to_string(),
            album_id: "album-1".to_string(),
            duration_ms: 149_000,
            preview_url: None,
        };
        assert!(track.validate().is_ok());

        let negative = Track {
            duration_ms: -1,
            ..track
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_definition_ids_are_unique() {
        let a = PlaylistDefinition::new("top-weekly", "Top tracks of the week", true);
        let b = PlaylistDefinition::new("top-weekly", "Top tracks of the week", false);
        assert_ne!(a.id, b.id);
    }
}
