//! Wire types for the Web API
//!
//! Field names follow the service's snake_case JSON so no rename attributes
//! are needed. Collections default to empty on absence: a missing `items` or
//! `images` array is not an error.

use chrono::DateTime;
use serde::Deserialize;

/// Current user's profile (`GET /me`)
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfileDto {
    pub id: String,
}

/// An image rendition with optional dimensions
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDto {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Pick the largest rendition, preferring explicit widths. The service
/// usually orders renditions largest-first, so the first entry is the
/// fallback.
pub(crate) fn largest_image(images: &[ImageDto]) -> Option<&str> {
    images
        .iter()
        .max_by_key(|img| img.width.unwrap_or(0))
        .or_else(|| images.first())
        .map(|img| img.url.as_str())
}

/// Artist as embedded in track payloads (no images at this depth)
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistSummaryDto {
    pub id: String,
    pub name: String,
}

/// Album as embedded in track payloads
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageDto>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl AlbumDto {
    /// URL of the largest cover image, if any
    pub fn largest_image(&self) -> Option<&str> {
        largest_image(&self.images)
    }
}

/// Full track payload (`GET /tracks/{id}` and recently-played items)
#[derive(Debug, Clone, Deserialize)]
pub struct TrackDto {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    #[serde(default)]
    pub preview_url: Option<String>,
    pub album: AlbumDto,
    #[serde(default)]
    pub artists: Vec<ArtistSummaryDto>,
}

/// One recently-played item: a track and when it finished playing
#[derive(Debug, Clone, Deserialize)]
pub struct PlayedItemDto {
    pub track: TrackDto,
    /// RFC 3339 timestamp from the service
    pub played_at: String,
}

impl PlayedItemDto {
    /// `played_at` as Unix milliseconds; `None` when the service sends a
    /// timestamp that does not parse
    pub fn played_at_ms(&self) -> Option<i64> {
        DateTime::parse_from_rfc3339(&self.played_at)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }
}

/// `GET /me/player/recently-played` response
#[derive(Debug, Clone, Deserialize)]
pub struct RecentlyPlayedResponse {
    #[serde(default)]
    pub items: Vec<PlayedItemDto>,
}

/// Full artist payload (`GET /artists/{id}`), including images
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistDetailsDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageDto>,
}

impl ArtistDetailsDto {
    /// URL of the largest artist image, if any
    pub fn largest_image(&self) -> Option<&str> {
        largest_image(&self.images)
    }
}

/// `POST /users/{id}/playlists` response
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPlaylistDto {
    pub id: String,
}
