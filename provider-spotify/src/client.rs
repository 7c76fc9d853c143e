//! Web API client implementation
//!
//! Implements [`SpotifyApi`] over the `HttpClient` seam. Every call funnels
//! through [`SpotifyClient::execute_with_retry`], which applies the
//! classification and bounded-backoff policy from [`crate::retry`]:
//! unauthorized raises, rate-limit/timeout sleep and retry within the attempt
//! budget, and any other failure degrades to a `None`/no-op result.

use async_trait::async_trait;
use core_runtime::config::{SpotifyApiConfig, SyncTuning};
use core_runtime::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SpotifyError};
use crate::retry::{classify, Classified, RetryPolicy};
use crate::types::{
    ArtistDetailsDto, CreatedPlaylistDto, PlayedItemDto, RecentlyPlayedResponse, TrackDto,
    UserProfileDto,
};

/// Timeout for individual API requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed streaming-service API consumed by the orchestrators.
///
/// `Ok(None)` on the fetching methods means the call degraded (the service
/// answered with a non-retryable failure); callers log and move on. An
/// `Err(SpotifyError::Unauthorized)` means the access token was rejected and
/// the caller owns recovery.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Id of the user the access token belongs to
    async fn user_profile(&self, access_token: &str) -> Result<Option<String>>;

    /// Recently-played items strictly after `after_ms`. Single page, capped
    /// by the service at 50 items; item order is not guaranteed to be
    /// chronological.
    async fn recently_played(
        &self,
        access_token: &str,
        after_ms: i64,
    ) -> Result<Option<Vec<PlayedItemDto>>>;

    /// Full artist payload, including images
    async fn artist_details(
        &self,
        access_token: &str,
        artist_id: &str,
    ) -> Result<Option<ArtistDetailsDto>>;

    /// Full track payload, including its artist list
    async fn track_details(&self, access_token: &str, track_id: &str)
        -> Result<Option<TrackDto>>;

    /// Create an empty private playlist owned by `owner_id`; returns the
    /// remote playlist id
    async fn create_playlist(
        &self,
        access_token: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<String>>;

    /// Add the given tracks to a remote playlist
    async fn populate_playlist(
        &self,
        access_token: &str,
        remote_id: &str,
        track_ids: &[String],
    ) -> Result<()>;

    /// Remove the given tracks from a remote playlist
    async fn clear_playlist(
        &self,
        access_token: &str,
        remote_id: &str,
        track_ids: &[String],
    ) -> Result<()>;
}

/// `HttpClient`-backed implementation of [`SpotifyApi`]
pub struct SpotifyClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    page_size: u32,
    policy: RetryPolicy,
}

impl SpotifyClient {
    /// Create a new client
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        config: &SpotifyApiConfig,
        tuning: &SyncTuning,
    ) -> Self {
        Self {
            http_client,
            base_url: config.api_base_url.clone(),
            page_size: tuning.history_page_size,
            policy: RetryPolicy {
                max_attempts: tuning.max_call_attempts,
                default_delay: tuning.default_retry_delay,
                max_delay: tuning.max_retry_delay,
            },
        }
    }

    /// Execute a request under the retry policy.
    ///
    /// # Returns
    /// - `Ok(Some(response))` on success (2xx)
    /// - `Ok(None)` when the call degraded (non-retryable failure)
    /// - `Err(Unauthorized)` on 401
    /// - `Err(RetriesExhausted)` when the attempt budget ran out
    async fn execute_with_retry(&self, request: HttpRequest) -> Result<Option<HttpResponse>> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let outcome = match self.http_client.execute(request.clone()).await {
                Ok(response) => classify(response),
                Err(e) => {
                    // Transport failures are transient: same tier as a
                    // request timeout.
                    warn!(url = %request.url, error = %e, "Transport failure");
                    Classified::Timeout
                }
            };

            let retry_after = match outcome {
                Classified::Success(response) => return Ok(Some(response)),
                Classified::Unauthorized => {
                    warn!(url = %request.url, "Access token not valid");
                    return Err(SpotifyError::Unauthorized);
                }
                Classified::Failed { status } => {
                    warn!(url = %request.url, status, "Call failed, degrading");
                    return Ok(None);
                }
                Classified::RateLimited { retry_after } => {
                    warn!(url = %request.url, "Rate limited");
                    retry_after
                }
                Classified::Timeout => {
                    warn!(url = %request.url, "Request timed out");
                    None
                }
            };

            if attempt >= self.policy.max_attempts {
                warn!(
                    url = %request.url,
                    attempts = attempt,
                    "Retry budget exhausted, abandoning call"
                );
                return Err(SpotifyError::RetriesExhausted { attempts: attempt });
            }

            let delay = self.policy.delay_for(retry_after);
            debug!(
                url = %request.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Sleeping before retry"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn get(&self, access_token: &str, path: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, format!("{}{}", self.base_url, path))
            .bearer_token(access_token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    /// Parse a successful response body, degrading on malformed payloads
    fn parse<T: serde::de::DeserializeOwned>(response: HttpResponse, what: &str) -> Option<T> {
        match serde_json::from_slice(&response.body) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(what, error = %e, "Failed to parse response body");
                None
            }
        }
    }
}

#[async_trait]
impl SpotifyApi for SpotifyClient {
    #[instrument(skip(self, access_token))]
    async fn user_profile(&self, access_token: &str) -> Result<Option<String>> {
        let request = self.get(access_token, "/me");

        let Some(response) = self.execute_with_retry(request).await? else {
            return Ok(None);
        };

        let profile: Option<UserProfileDto> = Self::parse(response, "user profile");
        Ok(profile.map(|p| p.id))
    }

    #[instrument(skip(self, access_token))]
    async fn recently_played(
        &self,
        access_token: &str,
        after_ms: i64,
    ) -> Result<Option<Vec<PlayedItemDto>>> {
        let path = format!(
            "/me/player/recently-played?limit={}&after={}",
            self.page_size, after_ms
        );
        let request = self.get(access_token, &path);

        let Some(response) = self.execute_with_retry(request).await? else {
            return Ok(None);
        };

        let parsed: Option<RecentlyPlayedResponse> = Self::parse(response, "recently played");
        match parsed {
            Some(body) => {
                info!(count = body.items.len(), "Recently played tracks retrieved");
                Ok(Some(body.items))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, access_token))]
    async fn artist_details(
        &self,
        access_token: &str,
        artist_id: &str,
    ) -> Result<Option<ArtistDetailsDto>> {
        let request = self.get(access_token, &format!("/artists/{}", artist_id));

        let Some(response) = self.execute_with_retry(request).await? else {
            return Ok(None);
        };

        Ok(Self::parse(response, "artist details"))
    }

    #[instrument(skip(self, access_token))]
    async fn track_details(
        &self,
        access_token: &str,
        track_id: &str,
    ) -> Result<Option<TrackDto>> {
        let request = self.get(access_token, &format!("/tracks/{}", track_id));

        let Some(response) = self.execute_with_retry(request).await? else {
            return Ok(None);
        };

        Ok(Self::parse(response, "track details"))
    }

    #[instrument(skip(self, access_token))]
    async fn create_playlist(
        &self,
        access_token: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<String>> {
        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/users/{}/playlists", self.base_url, owner_id),
        )
        .bearer_token(access_token)
        .timeout(REQUEST_TIMEOUT)
        .json(&json!({ "name": name, "public": false }))
        .map_err(|e| SpotifyError::Internal(e.to_string()))?;

        let Some(response) = self.execute_with_retry(request).await? else {
            return Ok(None);
        };

        let created: Option<CreatedPlaylistDto> = Self::parse(response, "created playlist");
        Ok(created.map(|p| p.id))
    }

    #[instrument(skip(self, access_token, track_ids), fields(count = track_ids.len()))]
    async fn populate_playlist(
        &self,
        access_token: &str,
        remote_id: &str,
        track_ids: &[String],
    ) -> Result<()> {
        if track_ids.is_empty() {
            return Ok(());
        }

        let uris: Vec<String> = track_ids
            .iter()
            .map(|id| format!("spotify:track:{}", id))
            .collect();

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/playlists/{}/tracks", self.base_url, remote_id),
        )
        .bearer_token(access_token)
        .timeout(REQUEST_TIMEOUT)
        .json(&json!({ "uris": uris }))
        .map_err(|e| SpotifyError::Internal(e.to_string()))?;

        if self.execute_with_retry(request).await?.is_none() {
            warn!(remote_id, "Populate degraded; remote playlist left as-is");
        }

        Ok(())
    }

    #[instrument(skip(self, access_token, track_ids), fields(count = track_ids.len()))]
    async fn clear_playlist(
        &self,
        access_token: &str,
        remote_id: &str,
        track_ids: &[String],
    ) -> Result<()> {
        if track_ids.is_empty() {
            return Ok(());
        }

        let tracks: Vec<serde_json::Value> = track_ids
            .iter()
            .map(|id| json!({ "uri": format!("spotify:track:{}", id) }))
            .collect();

        let request = HttpRequest::new(
            HttpMethod::Delete,
            format!("{}/playlists/{}/tracks", self.base_url, remote_id),
        )
        .bearer_token(access_token)
        .timeout(REQUEST_TIMEOUT)
        .json(&json!({ "tracks": tracks }))
        .map_err(|e| SpotifyError::Internal(e.to_string()))?;

        if self.execute_with_retry(request).await?.is_none() {
            warn!(remote_id, "Clear degraded; remote playlist left as-is");
        }

        Ok(())
    }
}
