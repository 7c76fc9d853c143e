//! # History Sync Orchestrator
//!
//! Ingests each user's recently-played history and keeps the catalog
//! backfilled.
//!
//! ## Workflow (per credential, strictly sequential)
//!
//! 1. Proactively refresh an expired credential; a failed refresh abandons
//!    the credential for this cycle
//! 2. Resolve the user id, fetching the remote profile and linking the
//!    credential on first contact
//! 3. Fetch recently-played items since the watermark (single page, service
//!    cap 50)
//! 4. A degraded or empty fetch skips ingest but still runs the image
//!    backfill
//! 5. Upsert missing artists, albums, tracks and ordered artist links
//! 6. Append one play event per item; advance the watermark to the maximum
//!    played-at in the batch (source order is not chronological)
//! 7. Backfill images for artists that have none; per-artist failures are
//!    isolated
//! 8. On an authorization failure anywhere above: refresh once and re-run the
//!    whole iteration; a second failure abandons the credential
//!
//! A credential's unrecoverable failure never aborts the remaining
//! credentials.

use core_auth::{Credential, CredentialStore, SqliteCredentialStore, TokenRefresher};
use core_catalog::models::{Album, Artist, PlayEvent, Track};
use core_catalog::repositories::{
    AlbumRepository, ArtistRepository, PlayHistoryRepository, SqliteAlbumRepository,
    SqliteArtistRepository, SqlitePlayHistoryRepository, SqliteTrackRepository,
    SqliteUserRepository, TrackRepository, UserRepository,
};
use provider_spotify::{PlayedItemDto, SpotifyApi, SpotifyError, TrackDto};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::retry::AuthAttempt;

/// Outcome counts for one sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Credentials that completed their iteration
    pub synced: u64,
    /// Credentials abandoned for this cycle (refresh failed, profile
    /// unavailable, or still unauthorized after the single refresh)
    pub abandoned: u64,
    /// Credentials whose iteration hit an unrecoverable store error
    pub failed: u64,
}

/// History sync orchestrator
pub struct HistorySync {
    credentials: Arc<dyn CredentialStore>,
    users: Arc<dyn UserRepository>,
    artists: Arc<dyn ArtistRepository>,
    albums: Arc<dyn AlbumRepository>,
    tracks: Arc<dyn TrackRepository>,
    history: Arc<dyn PlayHistoryRepository>,
    refresher: Arc<dyn TokenRefresher>,
    api: Arc<dyn SpotifyApi>,
}

impl HistorySync {
    /// Create a new orchestrator over the given pool. Stores are built
    /// internally; the refresher and API client are injected so hosts and
    /// tests control the remote side.
    pub fn new(
        pool: SqlitePool,
        refresher: Arc<dyn TokenRefresher>,
        api: Arc<dyn SpotifyApi>,
    ) -> Self {
        Self {
            credentials: Arc::new(SqliteCredentialStore::new(pool.clone())),
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            artists: Arc::new(SqliteArtistRepository::new(pool.clone())),
            albums: Arc::new(SqliteAlbumRepository::new(pool.clone())),
            tracks: Arc::new(SqliteTrackRepository::new(pool.clone())),
            history: Arc::new(SqlitePlayHistoryRepository::new(pool)),
            refresher,
            api,
        }
    }

    /// Run one sync cycle over all stored credentials.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let credentials = self.credentials.all().await?;
        info!(count = credentials.len(), "Starting history sync cycle");

        let mut report = CycleReport::default();
        for credential in credentials {
            let credential_id = credential.id.clone();
            match self.sync_credential(credential).await {
                Ok(true) => report.synced += 1,
                Ok(false) => report.abandoned += 1,
                Err(e) => {
                    warn!(credential_id = %credential_id, error = %e, "Credential sync failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            synced = report.synced,
            abandoned = report.abandoned,
            failed = report.failed,
            "History sync cycle finished"
        );
        Ok(report)
    }

    /// One credential's iteration under the bounded auth-retry policy.
    ///
    /// Returns `Ok(false)` when the credential was abandoned for this cycle.
    async fn sync_credential(&self, mut credential: Credential) -> Result<bool> {
        if credential.is_expired() {
            debug!(credential_id = %credential.id, "Access token expired, refreshing proactively");
            match self.refresh_and_store(&credential).await {
                Some(fresh) => credential = fresh,
                None => return Ok(false),
            }
        }

        let mut attempt = AuthAttempt::FirstAttempt;
        loop {
            match self.sync_once(&credential).await {
                Ok(completed) => return Ok(completed),
                Err(SyncError::AuthExpired) => match attempt.on_auth_failure() {
                    Some(next) => {
                        info!(
                            credential_id = %credential.id,
                            "Token rejected mid-iteration ({}), refreshing",
                            attempt
                        );
                        match self.refresh_and_store(&credential).await {
                            Some(fresh) => {
                                credential = fresh;
                                attempt = next;
                            }
                            None => return Ok(false),
                        }
                    }
                    None => {
                        warn!(
                            credential_id = %credential.id,
                            "Still unauthorized after refresh, abandoning credential for this cycle"
                        );
                        return Ok(false);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Refresh a credential and persist the new tokens. `None` means the
    /// credential must be abandoned for this cycle.
    async fn refresh_and_store(&self, credential: &Credential) -> Option<Credential> {
        match self.refresher.refresh(credential).await {
            Ok(Some(fresh)) => match self.credentials.update_tokens(&fresh).await {
                Ok(()) => Some(fresh),
                Err(e) => {
                    warn!(credential_id = %credential.id, error = %e, "Failed to persist refreshed tokens");
                    None
                }
            },
            Ok(None) => {
                warn!(credential_id = %credential.id, "Refresh token no longer valid, abandoning");
                None
            }
            Err(e) => {
                warn!(credential_id = %credential.id, error = %e, "Token refresh failed, abandoning");
                None
            }
        }
    }

    /// Steps 2-7 of the iteration. Raises `SyncError::AuthExpired` on any
    /// authorization failure so the caller can drive the retry machine.
    async fn sync_once(&self, credential: &Credential) -> Result<bool> {
        let Some(user_id) = self.resolve_user(credential).await? else {
            return Ok(false);
        };

        let state = self
            .users
            .find(&user_id)
            .await?
            .ok_or_else(|| SyncError::UserNotFound(user_id.clone()))?;
        let watermark_ms = state.last_synced_at_ms.unwrap_or(0);

        match self
            .degrade(
                self.api
                    .recently_played(&credential.access_token, watermark_ms)
                    .await,
                "recently played",
            )? {
            Some(items) if !items.is_empty() => {
                self.ingest_batch(&user_id, &items).await?;
            }
            Some(_) => {
                info!(user_id = %user_id, "No recently played tracks since last sync");
            }
            None => {
                warn!(user_id = %user_id, "Failed to retrieve recently played tracks, skipping ingest");
            }
        }

        self.backfill_artist_images(credential).await?;
        Ok(true)
    }

    /// Resolve the credential's user id, creating and linking the user row on
    /// first contact. `None` means the profile could not be resolved and the
    /// credential is abandoned for this cycle.
    async fn resolve_user(&self, credential: &Credential) -> Result<Option<String>> {
        if let Some(user_id) = &credential.user_id {
            return Ok(Some(user_id.clone()));
        }

        let profile = self.degrade(
            self.api.user_profile(&credential.access_token).await,
            "user profile",
        )?;
        let Some(profile_id) = profile else {
            warn!(credential_id = %credential.id, "Could not resolve user profile, abandoning credential");
            return Ok(None);
        };

        self.users.insert_if_missing(&profile_id).await?;
        self.credentials.link_user(&credential.id, &profile_id).await?;
        info!(credential_id = %credential.id, user_id = %profile_id, "Linked credential to user");

        Ok(Some(profile_id))
    }

    /// Steps 5-6: catalog upsert, play-event append, watermark advance.
    async fn ingest_batch(&self, user_id: &str, items: &[PlayedItemDto]) -> Result<()> {
        for item in items {
            self.upsert_catalog(&item.track).await?;
        }

        let mut events = Vec::with_capacity(items.len());
        let mut max_played_ms = i64::MIN;
        for item in items {
            let Some(played_at_ms) = item.played_at_ms() else {
                warn!(
                    track_id = %item.track.id,
                    played_at = %item.played_at,
                    "Unparseable played-at timestamp, skipping event"
                );
                continue;
            };
            max_played_ms = max_played_ms.max(played_at_ms);
            events.push(PlayEvent {
                user_id: user_id.to_string(),
                track_id: item.track.id.clone(),
                played_at_ms,
            });
        }

        self.history.append(&events).await?;

        if max_played_ms > i64::MIN {
            let advanced = self.users.update_last_synced(user_id, max_played_ms).await?;
            if !advanced {
                warn!(
                    user_id = %user_id,
                    batch_max_ms = max_played_ms,
                    "Watermark already newer than batch, not moved"
                );
            }
        }

        info!(
            user_id = %user_id,
            events = events.len(),
            watermark_ms = max_played_ms,
            "Ingested play batch"
        );
        Ok(())
    }

    /// Step 5 for one track: insert whichever of its artists, album, and the
    /// track itself are missing. Artist links are only written when the track
    /// row was actually inserted here.
    async fn upsert_catalog(&self, track: &TrackDto) -> Result<()> {
        for artist in &track.artists {
            self.artists
                .insert_if_missing(&Artist::new(&artist.id, &artist.name))
                .await?;
        }

        let album = Album {
            id: track.album.id.clone(),
            name: track.album.name.clone(),
            image_url: track.album.largest_image().map(str::to_string),
            release_date: track.album.release_date.clone(),
        };
        self.albums.insert_if_missing(&album).await?;

        let row = Track {
            id: track.id.clone(),
            name: track.name.clone(),
            album_id: track.album.id.clone(),
            duration_ms: track.duration_ms,
            preview_url: track.preview_url.clone(),
        };
        if self.tracks.insert_if_missing(&row).await? {
            let artist_ids: Vec<String> =
                track.artists.iter().map(|a| a.id.clone()).collect();
            self.tracks.link_artists(&track.id, &artist_ids).await?;
        }

        Ok(())
    }

    /// Step 7: fetch details for every artist still missing an image. A
    /// failure on one artist is isolated; an authorization failure aborts the
    /// scan so the retry machine can act.
    async fn backfill_artist_images(&self, credential: &Credential) -> Result<()> {
        let missing = self.artists.without_image().await?;
        if missing.is_empty() {
            return Ok(());
        }

        info!(count = missing.len(), "Backfilling artist images");
        for artist in missing {
            match self
                .api
                .artist_details(&credential.access_token, &artist.id)
                .await
            {
                Ok(Some(details)) => {
                    if let Some(url) = details.largest_image() {
                        self.artists.update_image(&artist.id, url).await?;
                    } else {
                        debug!(artist_id = %artist.id, "Artist has no image yet");
                    }
                }
                Ok(None) => {
                    warn!(artist_id = %artist.id, "Failed to retrieve artist info, skipping");
                }
                Err(SpotifyError::Unauthorized) => return Err(SyncError::AuthExpired),
                Err(e) => {
                    warn!(artist_id = %artist.id, error = %e, "Artist lookup degraded, skipping");
                }
            }
        }

        Ok(())
    }

    /// Maintenance operation: re-link tracks that lost their artist links to
    /// a crash between the track insert and its link inserts. Runs under the
    /// same bounded auth-retry policy, at operation granularity, using the
    /// curator credential.
    ///
    /// # Returns
    /// The number of tracks whose links were restored.
    #[instrument(skip(self))]
    pub async fn repair_track_links(&self) -> Result<u64> {
        let Some(mut credential) = self.credentials.curator().await? else {
            return Err(SyncError::NoCuratorCredential);
        };

        let mut attempt = AuthAttempt::FirstAttempt;
        loop {
            match self.repair_once(&credential).await {
                Err(SyncError::AuthExpired) => match attempt.on_auth_failure() {
                    Some(next) => match self.refresh_and_store(&credential).await {
                        Some(fresh) => {
                            credential = fresh;
                            attempt = next;
                        }
                        None => return Err(SyncError::AuthExpired),
                    },
                    None => {
                        warn!("Still unauthorized after refresh, aborting link repair");
                        return Err(SyncError::AuthExpired);
                    }
                },
                other => return other,
            }
        }
    }

    async fn repair_once(&self, credential: &Credential) -> Result<u64> {
        let orphans = self.tracks.ids_without_artists().await?;
        info!(count = orphans.len(), "Tracks without artist links");

        let mut repaired = 0u64;
        for track_id in orphans {
            match self
                .api
                .track_details(&credential.access_token, &track_id)
                .await
            {
                Ok(Some(track)) => {
                    for artist in &track.artists {
                        self.artists
                            .insert_if_missing(&Artist::new(&artist.id, &artist.name))
                            .await?;
                    }
                    let artist_ids: Vec<String> =
                        track.artists.iter().map(|a| a.id.clone()).collect();
                    self.tracks.link_artists(&track_id, &artist_ids).await?;
                    repaired += 1;
                }
                Ok(None) => {
                    warn!(track_id = %track_id, "Failed to retrieve track details, skipping");
                }
                Err(SpotifyError::Unauthorized) => return Err(SyncError::AuthExpired),
                Err(e) => {
                    warn!(track_id = %track_id, error = %e, "Track lookup degraded, skipping");
                }
            }
        }

        Ok(repaired)
    }

    /// Collapse provider failures into the three tiers the orchestrator acts
    /// on: unauthorized raises, everything else degrades to `None`.
    fn degrade<T>(
        &self,
        result: provider_spotify::Result<Option<T>>,
        what: &'static str,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(value),
            Err(SpotifyError::Unauthorized) => Err(SyncError::AuthExpired),
            Err(e) => {
                warn!(what, error = %e, "Call degraded");
                Ok(None)
            }
        }
    }
}
