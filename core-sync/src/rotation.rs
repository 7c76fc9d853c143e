//! # Playlist Rotation Orchestrator
//!
//! Keeps the remote "top" playlists in step with the logical top-list
//! definitions.
//!
//! ## Binding State Machine
//!
//! Each (group, name) pair is in exactly one state with respect to its
//! remote playlist:
//!
//! ```text
//! Unbound --create+map--> BoundCurrent --definition superseded--> BoundStale
//!     BoundStale --clear+repopulate+repoint--> BoundCurrent
//! ```
//!
//! Phase A handles `Unbound` pairs (creation), Phase B handles `BoundStale`
//! pairs (rotation). The remote playlist's identity is preserved across
//! rotations; only the definition it is bound to changes, so followers never
//! see a playlist vanish.
//!
//! An authorization failure aborts the whole cycle after exactly one
//! refresh-and-retry. Failures are not isolated per group: the first failing
//! pair ends the cycle.

use core_auth::{Credential, CredentialStore, SqliteCredentialStore, TokenRefresher};
use core_catalog::models::PlaylistItem;
use core_catalog::repositories::{PlaylistRepository, SqlitePlaylistRepository};
use provider_spotify::SpotifyApi;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::retry::AuthAttempt;

/// A (group, name) pair's relationship to its remote playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteBinding {
    /// No remote playlist exists for this pair yet
    Unbound,
    /// The remote playlist is bound to the pair's current definition
    BoundCurrent,
    /// The remote playlist is bound to a superseded definition
    BoundStale,
}

impl RemoteBinding {
    /// Classify from the mapped definition's current flag (`None` = no
    /// mapping exists for the pair).
    pub fn classify(mapped_is_current: Option<bool>) -> Self {
        match mapped_is_current {
            None => RemoteBinding::Unbound,
            Some(true) => RemoteBinding::BoundCurrent,
            Some(false) => RemoteBinding::BoundStale,
        }
    }
}

/// Outcome counts for one rotation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Remote playlists created in Phase A
    pub created: u64,
    /// Remote playlists rotated in Phase B
    pub rotated: u64,
    /// Whether the cycle was abandoned on a repeated authorization failure
    pub aborted: bool,
}

/// Playlist rotation orchestrator
pub struct PlaylistRotation {
    credentials: Arc<dyn CredentialStore>,
    playlists: Arc<dyn PlaylistRepository>,
    refresher: Arc<dyn TokenRefresher>,
    api: Arc<dyn SpotifyApi>,
}

impl PlaylistRotation {
    /// Create a new orchestrator over the given pool.
    pub fn new(
        pool: SqlitePool,
        refresher: Arc<dyn TokenRefresher>,
        api: Arc<dyn SpotifyApi>,
    ) -> Self {
        Self {
            credentials: Arc::new(SqliteCredentialStore::new(pool.clone())),
            playlists: Arc::new(SqlitePlaylistRepository::new(pool)),
            refresher,
            api,
        }
    }

    /// Run one rotation cycle using the curator credential.
    ///
    /// # Errors
    ///
    /// - `SyncError::NoCuratorCredential` when no curator credential exists
    /// - `SyncError::CuratorNotLinked` when the curator credential has no
    ///   user id (playlist creation needs an owner)
    /// - `SyncError::RemoteCreateFailed` when the service degrades a
    ///   playlist-creation call
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<RotationReport> {
        let Some(mut credential) = self.credentials.curator().await? else {
            return Err(SyncError::NoCuratorCredential);
        };
        let owner_id = credential
            .user_id
            .clone()
            .ok_or(SyncError::CuratorNotLinked)?;

        let mut attempt = AuthAttempt::FirstAttempt;
        loop {
            match self.rotate_once(&credential, &owner_id).await {
                Ok(report) => {
                    self.audit_bindings().await?;
                    info!(
                        created = report.created,
                        rotated = report.rotated,
                        "Rotation cycle finished"
                    );
                    return Ok(report);
                }
                Err(SyncError::AuthExpired) => match attempt.on_auth_failure() {
                    Some(next) => {
                        info!("Curator token rejected, refreshing");
                        match self.refresher.refresh(&credential).await {
                            Ok(Some(fresh)) => {
                                self.credentials.update_tokens(&fresh).await?;
                                credential = fresh;
                                attempt = next;
                            }
                            Ok(None) | Err(_) => {
                                warn!("Curator token refresh failed, aborting cycle");
                                return Ok(RotationReport {
                                    aborted: true,
                                    ..RotationReport::default()
                                });
                            }
                        }
                    }
                    None => {
                        warn!("Curator token still unauthorized, aborting cycle");
                        return Ok(RotationReport {
                            aborted: true,
                            ..RotationReport::default()
                        });
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Phases A and B, run once. Re-entrant: work completed before an auth
    /// retry is visible in the store, so the second pass skips it.
    async fn rotate_once(&self, credential: &Credential, owner_id: &str) -> Result<RotationReport> {
        let mut report = RotationReport::default();

        // Phase A: Unbound -> BoundCurrent
        for definition in self.playlists.creatable_definitions().await? {
            debug!(
                group = %definition.group_name,
                name = %definition.name,
                state = ?RemoteBinding::Unbound,
                "Creating remote playlist"
            );

            let remote_id = match self
                .api
                .create_playlist(&credential.access_token, owner_id, &definition.name)
                .await
            {
                Ok(Some(id)) => id,
                Ok(None) => return Err(SyncError::RemoteCreateFailed(definition.id.clone())),
                Err(e) => return Err(SyncError::from(e)),
            };

            self.playlists.map_remote(&definition.id, &remote_id).await?;

            let items = self.playlists.items(&definition.id).await?;
            self.api
                .populate_playlist(
                    &credential.access_token,
                    &remote_id,
                    &Self::track_ids(&items),
                )
                .await
                .map_err(SyncError::from)?;

            info!(
                group = %definition.group_name,
                name = %definition.name,
                remote_id = %remote_id,
                items = items.len(),
                "Remote playlist created and populated"
            );
            report.created += 1;
        }

        // Phase B: BoundStale -> BoundCurrent
        for stale in self.playlists.stale_mappings().await? {
            let Some(current) = self
                .playlists
                .current_sibling(&stale.group_name, &stale.name)
                .await?
            else {
                debug!(
                    group = %stale.group_name,
                    name = %stale.name,
                    "No current sibling, leaving binding untouched"
                );
                continue;
            };

            let old_items = self.playlists.items(&stale.definition_id).await?;
            self.api
                .clear_playlist(
                    &credential.access_token,
                    &stale.remote_id,
                    &Self::track_ids(&old_items),
                )
                .await
                .map_err(SyncError::from)?;

            let new_items = self.playlists.items(&current.id).await?;
            self.api
                .populate_playlist(
                    &credential.access_token,
                    &stale.remote_id,
                    &Self::track_ids(&new_items),
                )
                .await
                .map_err(SyncError::from)?;

            self.playlists
                .repoint_remote(&stale.remote_id, &current.id)
                .await?;

            info!(
                group = %stale.group_name,
                name = %stale.name,
                remote_id = %stale.remote_id,
                "Rotated remote playlist to current definition"
            );
            report.rotated += 1;
        }

        Ok(report)
    }

    /// Post-cycle invariant audit: every mapped pair should be BoundCurrent,
    /// and no pair may hold more than one mapping. Violations are logged, not
    /// raised; the next cycle gets another chance.
    async fn audit_bindings(&self) -> Result<()> {
        let mapped = self.playlists.mapped_definitions().await?;

        let mut per_pair: HashMap<(String, String), u32> = HashMap::new();
        for mapping in &mapped {
            *per_pair
                .entry((mapping.group_name.clone(), mapping.name.clone()))
                .or_insert(0) += 1;

            if RemoteBinding::classify(Some(mapping.is_current)) == RemoteBinding::BoundStale {
                warn!(
                    group = %mapping.group_name,
                    name = %mapping.name,
                    remote_id = %mapping.remote_id,
                    "Remote playlist still bound to an outdated definition after rotation"
                );
            }
        }

        for ((group, name), count) in per_pair {
            if count > 1 {
                warn!(
                    group = %group,
                    name = %name,
                    mappings = count,
                    "More than one remote mapping for a top-list pair"
                );
            }
        }

        Ok(())
    }

    fn track_ids(items: &[PlaylistItem]) -> Vec<String> {
        items.iter().map(|item| item.track_id.clone()).collect()
    }
}
