//! Integration tests for the sync and rotation orchestrators
//!
//! These run the real orchestrators against an in-memory SQLite database,
//! mocking only the remote side (API client and token refresher). They cover:
//! - Idempotence: an unchanged watermark plus unchanged remote data adds
//!   nothing
//! - Watermark advancement to max(played_at) and monotonicity
//! - Catalog dedup and ordered track-artist links
//! - The bounded refresh-once auth retry in both orchestrators
//! - Artist-image backfill isolation
//! - Rotation Phase A (creation) exclusivity and Phase B (repointing)

use async_trait::async_trait;
use core_auth::{Credential, CredentialStore, SqliteCredentialStore, TokenRefresher};
use core_catalog::create_test_pool;
use core_catalog::models::{Album, Artist, PlaylistDefinition, PlaylistItem, Track};
use core_catalog::repositories::{
    AlbumRepository, ArtistRepository, PlayHistoryRepository, PlaylistRepository,
    SqliteAlbumRepository, SqliteArtistRepository, SqlitePlayHistoryRepository,
    SqlitePlaylistRepository, SqliteTrackRepository, SqliteUserRepository, TrackRepository,
    UserRepository,
};
use core_sync::{HistorySync, PlaylistRotation, SyncError};
use mockall::mock;
use provider_spotify::types::{AlbumDto, ArtistDetailsDto, ArtistSummaryDto, ImageDto};
use provider_spotify::{PlayedItemDto, SpotifyApi, SpotifyError, TrackDto};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Mock Implementations
// ============================================================================

mock! {
    Api {}

    #[async_trait]
    impl SpotifyApi for Api {
        async fn user_profile(&self, access_token: &str) -> provider_spotify::Result<Option<String>>;
        async fn recently_played(
            &self,
            access_token: &str,
            after_ms: i64,
        ) -> provider_spotify::Result<Option<Vec<PlayedItemDto>>>;
        async fn artist_details(
            &self,
            access_token: &str,
            artist_id: &str,
        ) -> provider_spotify::Result<Option<ArtistDetailsDto>>;
        async fn track_details(
            &self,
            access_token: &str,
            track_id: &str,
        ) -> provider_spotify::Result<Option<TrackDto>>;
        async fn create_playlist(
            &self,
            access_token: &str,
            owner_id: &str,
            name: &str,
        ) -> provider_spotify::Result<Option<String>>;
        async fn populate_playlist(
            &self,
            access_token: &str,
            remote_id: &str,
            track_ids: &[String],
        ) -> provider_spotify::Result<()>;
        async fn clear_playlist(
            &self,
            access_token: &str,
            remote_id: &str,
            track_ids: &[String],
        ) -> provider_spotify::Result<()>;
    }
}

mock! {
    Refresher {}

    #[async_trait]
    impl TokenRefresher for Refresher {
        async fn refresh(&self, credential: &Credential) -> core_auth::Result<Option<Credential>>;
    }
}

/// A refresher for tests that must not refresh anything.
fn no_refresh() -> MockRefresher {
    let mut refresher = MockRefresher::new();
    refresher.expect_refresh().times(0);
    refresher
}

// ============================================================================
// Fixtures
// ============================================================================

// 2024-01-01T00:00:00Z
const JAN1_MS: i64 = 1_704_067_200_000;
const MINUTE_MS: i64 = 60_000;

fn played(track_id: &str, artist_ids: &[&str], played_at: &str) -> PlayedItemDto {
    PlayedItemDto {
        track: TrackDto {
            id: track_id.to_string(),
            name: format!("Track {}", track_id),
            duration_ms: 180_000,
            preview_url: None,
            album: AlbumDto {
                id: format!("album-of-{}", track_id),
                name: format!("Album of {}", track_id),
                images: vec![],
                release_date: None,
            },
            artists: artist_ids
                .iter()
                .map(|id| ArtistSummaryDto {
                    id: id.to_string(),
                    name: format!("Artist {}", id),
                })
                .collect(),
        },
        played_at: played_at.to_string(),
    }
}

fn artist_with_image(id: &str, url: &str) -> ArtistDetailsDto {
    ArtistDetailsDto {
        id: id.to_string(),
        name: format!("Artist {}", id),
        images: vec![ImageDto {
            url: url.to_string(),
            width: Some(640),
            height: Some(640),
        }],
    }
}

/// Insert a linked listener credential and its user row.
async fn seed_listener(pool: &SqlitePool, user_id: &str) -> Credential {
    SqliteUserRepository::new(pool.clone())
        .insert_if_missing(user_id)
        .await
        .unwrap();

    let mut credential = Credential::new("access-token", "refresh-token");
    credential.user_id = Some(user_id.to_string());
    SqliteCredentialStore::new(pool.clone())
        .insert(&credential)
        .await
        .unwrap();
    credential
}

/// Insert the curator credential, linked to `owner_id`.
async fn seed_curator(pool: &SqlitePool, owner_id: &str) -> Credential {
    SqliteUserRepository::new(pool.clone())
        .insert_if_missing(owner_id)
        .await
        .unwrap();

    let mut credential = Credential::new("curator-token", "curator-refresh");
    credential.user_id = Some(owner_id.to_string());
    credential.is_curator = true;
    SqliteCredentialStore::new(pool.clone())
        .insert(&credential)
        .await
        .unwrap();
    credential
}

/// Insert a catalog track (with its album) so playlist items can reference it.
async fn seed_track(pool: &SqlitePool, track_id: &str) {
    SqliteAlbumRepository::new(pool.clone())
        .insert_if_missing(&Album::new("seed-album", "Seed Album"))
        .await
        .unwrap();
    SqliteTrackRepository::new(pool.clone())
        .insert_if_missing(&Track {
            id: track_id.to_string(),
            name: track_id.to_string(),
            album_id: "seed-album".to_string(),
            duration_ms: 200_000,
            preview_url: None,
        })
        .await
        .unwrap();
}

// ============================================================================
// History sync
// ============================================================================

#[tokio::test]
async fn first_sync_ingests_batch_and_advances_watermark_to_max() {
    let pool = create_test_pool().await.unwrap();
    seed_listener(&pool, "user-1").await;

    let mut api = MockApi::new();
    // Watermark starts unset -> fetch from the epoch.
    api.expect_recently_played()
        .withf(|_, after_ms| *after_ms == 0)
        .times(1)
        .returning(|_, _| {
            Ok(Some(vec![
                played("t1", &["a1"], "2024-01-01T00:05:00.000Z"),
                played("t2", &["a2"], "2024-01-01T00:10:00.000Z"),
                played("t3", &["a1"], "2024-01-01T00:07:00.000Z"),
            ]))
        });
    // New artists have no image; degrade the backfill lookups.
    api.expect_artist_details().returning(|_, _| Ok(None));

    let sync = HistorySync::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(report.abandoned, 0);

    // Watermark = max(played_at), not the last list element.
    let user = SqliteUserRepository::new(pool.clone())
        .find("user-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.last_synced_at_ms, Some(JAN1_MS + 10 * MINUTE_MS));

    let history = SqlitePlayHistoryRepository::new(pool.clone());
    assert_eq!(history.count_for_user("user-1").await.unwrap(), 3);

    // Catalog rows were created.
    assert_eq!(
        SqliteTrackRepository::new(pool.clone()).count().await.unwrap(),
        3
    );
    assert_eq!(
        SqliteArtistRepository::new(pool.clone()).count().await.unwrap(),
        2
    );
}

#[tokio::test]
async fn rerun_with_unchanged_data_adds_nothing() {
    let pool = create_test_pool().await.unwrap();
    seed_listener(&pool, "user-1").await;

    // First cycle ingests one play.
    let mut api = MockApi::new();
    api.expect_recently_played()
        .times(1)
        .returning(|_, _| Ok(Some(vec![played("t1", &["a1"], "2024-01-01T00:10:00.000Z")])));
    api.expect_artist_details().returning(|_, _| Ok(None));
    let sync = HistorySync::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    sync.run_cycle().await.unwrap();

    // Second cycle: the fetch happens from the advanced watermark and the
    // service reports nothing newer.
    let mut api = MockApi::new();
    api.expect_recently_played()
        .withf(|_, after_ms| *after_ms == JAN1_MS + 10 * MINUTE_MS)
        .times(1)
        .returning(|_, _| Ok(Some(vec![])));
    api.expect_artist_details().returning(|_, _| Ok(None));
    let sync = HistorySync::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    sync.run_cycle().await.unwrap();

    let history = SqlitePlayHistoryRepository::new(pool.clone());
    assert_eq!(history.count_for_user("user-1").await.unwrap(), 1);
    assert_eq!(
        SqliteTrackRepository::new(pool.clone()).count().await.unwrap(),
        1
    );
    let user = SqliteUserRepository::new(pool)
        .find("user-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.last_synced_at_ms, Some(JAN1_MS + 10 * MINUTE_MS));
}

#[tokio::test]
async fn known_artist_is_not_reinserted_and_links_follow_source_order() {
    let pool = create_test_pool().await.unwrap();
    seed_listener(&pool, "user-1").await;

    // a1 already exists with an image; only a2 is new.
    let artists = SqliteArtistRepository::new(pool.clone());
    let mut existing = Artist::new("a1", "Artist a1");
    existing.image_url = Some("https://img.example/a1.jpg".to_string());
    artists.insert_if_missing(&existing).await.unwrap();

    let mut api = MockApi::new();
    api.expect_recently_played()
        .times(1)
        .returning(|_, _| Ok(Some(vec![played("t1", &["a1", "a2"], "2024-01-01T00:05:00.000Z")])));
    api.expect_artist_details().returning(|_, _| Ok(None));

    let sync = HistorySync::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    sync.run_cycle().await.unwrap();

    // Exactly one catalog row per artist, and a1 kept its image.
    assert_eq!(artists.count().await.unwrap(), 2);
    let a1 = artists.find_by_id("a1").await.unwrap().unwrap();
    assert_eq!(a1.image_url.as_deref(), Some("https://img.example/a1.jpg"));

    // Link rows exist for both, ordered as the source listed them.
    let links = SqliteTrackRepository::new(pool)
        .artist_links("t1")
        .await
        .unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!((links[0].artist_id.as_str(), links[0].position), ("a1", 0));
    assert_eq!((links[1].artist_id.as_str(), links[1].position), ("a2", 1));
}

#[tokio::test]
async fn degraded_fetch_skips_ingest_but_still_backfills_images() {
    let pool = create_test_pool().await.unwrap();
    seed_listener(&pool, "user-1").await;

    let artists = SqliteArtistRepository::new(pool.clone());
    artists
        .insert_if_missing(&Artist::new("a1", "Artist a1"))
        .await
        .unwrap();

    let mut api = MockApi::new();
    api.expect_recently_played().times(1).returning(|_, _| Ok(None));
    api.expect_artist_details()
        .withf(|_, id| id == "a1")
        .times(1)
        .returning(|_, id| Ok(Some(artist_with_image(id, "https://img.example/a1.jpg"))));

    let sync = HistorySync::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.synced, 1);

    // No events, but the image backfill ran.
    assert_eq!(
        SqlitePlayHistoryRepository::new(pool.clone())
            .count_for_user("user-1")
            .await
            .unwrap(),
        0
    );
    let a1 = artists.find_by_id("a1").await.unwrap().unwrap();
    assert_eq!(a1.image_url.as_deref(), Some("https://img.example/a1.jpg"));
}

#[tokio::test]
async fn one_failing_artist_does_not_abort_the_backfill_scan() {
    let pool = create_test_pool().await.unwrap();
    seed_listener(&pool, "user-1").await;

    let artists = SqliteArtistRepository::new(pool.clone());
    artists.insert_if_missing(&Artist::new("a1", "A1")).await.unwrap();
    artists.insert_if_missing(&Artist::new("a2", "A2")).await.unwrap();

    let mut api = MockApi::new();
    api.expect_recently_played().returning(|_, _| Ok(Some(vec![])));
    api.expect_artist_details().times(2).returning(|_, id| {
        if id == "a1" {
            Ok(None)
        } else {
            Ok(Some(artist_with_image(id, "https://img.example/a2.jpg")))
        }
    });

    let sync = HistorySync::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    sync.run_cycle().await.unwrap();

    assert!(artists.find_by_id("a1").await.unwrap().unwrap().image_url.is_none());
    assert_eq!(
        artists
            .find_by_id("a2")
            .await
            .unwrap()
            .unwrap()
            .image_url
            .as_deref(),
        Some("https://img.example/a2.jpg")
    );
}

#[tokio::test]
async fn unlinked_credential_resolves_profile_and_links_user() {
    let pool = create_test_pool().await.unwrap();
    let store = SqliteCredentialStore::new(pool.clone());
    store
        .insert(&Credential::new("access-token", "refresh-token"))
        .await
        .unwrap();

    let mut api = MockApi::new();
    api.expect_user_profile()
        .times(1)
        .returning(|_| Ok(Some("user-9".to_string())));
    api.expect_recently_played()
        .times(1)
        .returning(|_, _| Ok(Some(vec![])));
    api.expect_artist_details().returning(|_, _| Ok(None));

    let sync = HistorySync::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.synced, 1);

    assert!(SqliteUserRepository::new(pool.clone())
        .find("user-9")
        .await
        .unwrap()
        .is_some());
    let all = store.all().await.unwrap();
    assert_eq!(all[0].user_id.as_deref(), Some("user-9"));
}

#[tokio::test]
async fn unresolvable_profile_abandons_credential() {
    let pool = create_test_pool().await.unwrap();
    SqliteCredentialStore::new(pool.clone())
        .insert(&Credential::new("access-token", "refresh-token"))
        .await
        .unwrap();

    let mut api = MockApi::new();
    api.expect_user_profile().times(1).returning(|_| Ok(None));
    api.expect_recently_played().times(0);

    let sync = HistorySync::new(pool, Arc::new(no_refresh()), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.abandoned, 1);
}

#[tokio::test]
async fn expired_credential_is_refreshed_proactively() {
    let pool = create_test_pool().await.unwrap();
    let mut credential = seed_listener(&pool, "user-1").await;
    credential.expires_at_ms = Some(1); // long past
    let store = SqliteCredentialStore::new(pool.clone());
    store.update_tokens(&credential).await.unwrap();

    let refreshed = credential.with_tokens("fresh-access", "fresh-refresh", Some(i64::MAX));
    let mut refresher = MockRefresher::new();
    let returned = refreshed.clone();
    refresher
        .expect_refresh()
        .times(1)
        .returning(move |_| Ok(Some(returned.clone())));

    let mut api = MockApi::new();
    api.expect_recently_played()
        .withf(|token, _| token == "fresh-access")
        .times(1)
        .returning(|_, _| Ok(Some(vec![])));
    api.expect_artist_details().returning(|_, _| Ok(None));

    let sync = HistorySync::new(pool.clone(), Arc::new(refresher), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.synced, 1);

    // The refreshed tokens were persisted.
    let stored = store.all().await.unwrap();
    assert_eq!(stored[0].access_token, "fresh-access");
}

#[tokio::test]
async fn invalid_refresh_token_abandons_credential_without_api_calls() {
    let pool = create_test_pool().await.unwrap();
    let mut credential = seed_listener(&pool, "user-1").await;
    credential.expires_at_ms = Some(1);
    SqliteCredentialStore::new(pool.clone())
        .update_tokens(&credential)
        .await
        .unwrap();

    let mut refresher = MockRefresher::new();
    refresher.expect_refresh().times(1).returning(|_| Ok(None));

    let mut api = MockApi::new();
    api.expect_recently_played().times(0);

    let sync = HistorySync::new(pool, Arc::new(refresher), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.abandoned, 1);
}

#[tokio::test]
async fn auth_failure_retries_once_after_refresh_then_succeeds() {
    let pool = create_test_pool().await.unwrap();
    let credential = seed_listener(&pool, "user-1").await;

    let refreshed = credential.with_tokens("fresh-access", "refresh-token", None);
    let mut refresher = MockRefresher::new();
    let returned = refreshed.clone();
    refresher
        .expect_refresh()
        .times(1)
        .returning(move |_| Ok(Some(returned.clone())));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut api = MockApi::new();
    api.expect_recently_played().times(2).returning(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(SpotifyError::Unauthorized)
        } else {
            Ok(Some(vec![played("t1", &["a1"], "2024-01-01T00:05:00.000Z")]))
        }
    });
    api.expect_artist_details().returning(|_, _| Ok(None));

    let sync = HistorySync::new(pool.clone(), Arc::new(refresher), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(
        SqlitePlayHistoryRepository::new(pool)
            .count_for_user("user-1")
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn second_auth_failure_abandons_after_exactly_one_refresh() {
    let pool = create_test_pool().await.unwrap();
    let credential = seed_listener(&pool, "user-1").await;

    let refreshed = credential.with_tokens("fresh-access", "refresh-token", None);
    let mut refresher = MockRefresher::new();
    let returned = refreshed.clone();
    refresher
        .expect_refresh()
        .times(1) // the bound: exactly one refresh, never two
        .returning(move |_| Ok(Some(returned.clone())));

    let mut api = MockApi::new();
    api.expect_recently_played()
        .times(2) // once per attempt
        .returning(|_, _| Err(SpotifyError::Unauthorized));

    let sync = HistorySync::new(pool, Arc::new(refresher), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.synced, 0);
}

#[tokio::test]
async fn one_credentials_failure_does_not_stop_the_next() {
    let pool = create_test_pool().await.unwrap();

    // Two unlinked credentials: the first cannot resolve a profile, the
    // second can.
    let store = SqliteCredentialStore::new(pool.clone());
    let mut first = Credential::new("token-1", "refresh-1");
    first.id = "a-first".to_string();
    let mut second = Credential::new("token-2", "refresh-2");
    second.id = "b-second".to_string();
    store.insert(&first).await.unwrap();
    store.insert(&second).await.unwrap();

    let mut api = MockApi::new();
    api.expect_user_profile().times(2).returning(|token| {
        if token == "token-1" {
            Ok(None)
        } else {
            Ok(Some("user-2".to_string()))
        }
    });
    api.expect_recently_played()
        .times(1)
        .returning(|_, _| Ok(Some(vec![])));
    api.expect_artist_details().returning(|_, _| Ok(None));

    let sync = HistorySync::new(pool, Arc::new(no_refresh()), Arc::new(api));
    let report = sync.run_cycle().await.unwrap();
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.synced, 1);
}

#[tokio::test]
async fn repair_relinks_orphaned_tracks() {
    let pool = create_test_pool().await.unwrap();
    seed_curator(&pool, "curator-user").await;
    seed_track(&pool, "orphan-1").await;

    let mut api = MockApi::new();
    api.expect_track_details()
        .withf(|_, id| id == "orphan-1")
        .times(1)
        .returning(|_, _| {
            Ok(Some(TrackDto {
                id: "orphan-1".to_string(),
                name: "Orphan".to_string(),
                duration_ms: 200_000,
                preview_url: None,
                album: AlbumDto {
                    id: "seed-album".to_string(),
                    name: "Seed Album".to_string(),
                    images: vec![],
                    release_date: None,
                },
                artists: vec![
                    ArtistSummaryDto {
                        id: "a1".to_string(),
                        name: "A1".to_string(),
                    },
                    ArtistSummaryDto {
                        id: "a2".to_string(),
                        name: "A2".to_string(),
                    },
                ],
            }))
        });

    let sync = HistorySync::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    let repaired = sync.repair_track_links().await.unwrap();
    assert_eq!(repaired, 1);

    let tracks = SqliteTrackRepository::new(pool);
    assert!(tracks.ids_without_artists().await.unwrap().is_empty());
    let links = tracks.artist_links("orphan-1").await.unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].artist_id, "a1");
    assert_eq!(links[1].artist_id, "a2");
}

// ============================================================================
// Playlist rotation
// ============================================================================

#[tokio::test]
async fn phase_a_creates_maps_and_populates_by_score() {
    let pool = create_test_pool().await.unwrap();
    seed_curator(&pool, "curator-user").await;
    seed_track(&pool, "t-low").await;
    seed_track(&pool, "t-high").await;

    let playlists = SqlitePlaylistRepository::new(pool.clone());
    let definition = PlaylistDefinition::new("top-weekly", "Weekly top", true);
    playlists.insert_definition(&definition).await.unwrap();
    for (track_id, score) in [("t-low", 2.0), ("t-high", 8.0)] {
        playlists
            .insert_item(&PlaylistItem {
                definition_id: definition.id.clone(),
                track_id: track_id.to_string(),
                score,
            })
            .await
            .unwrap();
    }

    let mut api = MockApi::new();
    api.expect_create_playlist()
        .withf(|_, owner, name| owner == "curator-user" && name == "Weekly top")
        .times(1)
        .returning(|_, _, _| Ok(Some("remote-1".to_string())));
    api.expect_populate_playlist()
        .withf(|_, remote_id, track_ids| {
            remote_id == "remote-1" && track_ids == ["t-high".to_string(), "t-low".to_string()]
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let rotation = PlaylistRotation::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    let report = rotation.run_cycle().await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.rotated, 0);
    assert!(!report.aborted);

    // Exclusivity: the pair is mapped exactly once and no longer creatable.
    let mapped = playlists.mapped_definitions().await.unwrap();
    assert_eq!(mapped.len(), 1);
    assert_eq!(mapped[0].remote_id, "remote-1");
    assert_eq!(mapped[0].definition_id, definition.id);
    assert!(playlists.creatable_definitions().await.unwrap().is_empty());
}

#[tokio::test]
async fn phase_a_skips_pairs_whose_outdated_sibling_is_mapped() {
    let pool = create_test_pool().await.unwrap();
    seed_curator(&pool, "curator-user").await;

    let playlists = SqlitePlaylistRepository::new(pool.clone());
    let outdated = PlaylistDefinition::new("top-weekly", "Weekly top", false);
    let current = PlaylistDefinition::new("top-weekly", "Weekly top", true);
    playlists.insert_definition(&outdated).await.unwrap();
    playlists.insert_definition(&current).await.unwrap();
    playlists.map_remote(&outdated.id, "remote-1").await.unwrap();

    let mut api = MockApi::new();
    api.expect_create_playlist().times(0);
    // The pair instead rotates in Phase B (no items on either side).
    api.expect_clear_playlist().returning(|_, _, _| Ok(()));
    api.expect_populate_playlist().returning(|_, _, _| Ok(()));

    let rotation = PlaylistRotation::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    let report = rotation.run_cycle().await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.rotated, 1);
}

#[tokio::test]
async fn phase_b_rotates_contents_and_repoints_mapping() {
    let pool = create_test_pool().await.unwrap();
    seed_curator(&pool, "curator-user").await;
    seed_track(&pool, "old-track").await;
    seed_track(&pool, "new-track").await;

    let playlists = SqlitePlaylistRepository::new(pool.clone());
    let outdated = PlaylistDefinition::new("top-weekly", "Weekly top", false);
    let current = PlaylistDefinition::new("top-weekly", "Weekly top", true);
    playlists.insert_definition(&outdated).await.unwrap();
    playlists.insert_definition(&current).await.unwrap();
    playlists.map_remote(&outdated.id, "remote-1").await.unwrap();
    playlists
        .insert_item(&PlaylistItem {
            definition_id: outdated.id.clone(),
            track_id: "old-track".to_string(),
            score: 5.0,
        })
        .await
        .unwrap();
    playlists
        .insert_item(&PlaylistItem {
            definition_id: current.id.clone(),
            track_id: "new-track".to_string(),
            score: 7.0,
        })
        .await
        .unwrap();

    let mut api = MockApi::new();
    api.expect_clear_playlist()
        .withf(|_, remote_id, track_ids| {
            remote_id == "remote-1" && track_ids == ["old-track".to_string()]
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    api.expect_populate_playlist()
        .withf(|_, remote_id, track_ids| {
            remote_id == "remote-1" && track_ids == ["new-track".to_string()]
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let rotation = PlaylistRotation::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    let report = rotation.run_cycle().await.unwrap();
    assert_eq!(report.rotated, 1);

    // Same remote playlist, now bound to the current definition.
    let mapped = playlists.mapped_definitions().await.unwrap();
    assert_eq!(mapped.len(), 1);
    assert_eq!(mapped[0].remote_id, "remote-1");
    assert_eq!(mapped[0].definition_id, current.id);
    assert!(mapped[0].is_current);
    assert!(playlists.stale_mappings().await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_pair_without_current_sibling_is_left_untouched() {
    let pool = create_test_pool().await.unwrap();
    seed_curator(&pool, "curator-user").await;

    let playlists = SqlitePlaylistRepository::new(pool.clone());
    let outdated = PlaylistDefinition::new("top-weekly", "Weekly top", false);
    playlists.insert_definition(&outdated).await.unwrap();
    playlists.map_remote(&outdated.id, "remote-1").await.unwrap();

    let mut api = MockApi::new();
    api.expect_create_playlist().times(0);
    api.expect_clear_playlist().times(0);
    api.expect_populate_playlist().times(0);

    let rotation = PlaylistRotation::new(pool.clone(), Arc::new(no_refresh()), Arc::new(api));
    let report = rotation.run_cycle().await.unwrap();
    assert_eq!(report.rotated, 0);

    let mapped = playlists.mapped_definitions().await.unwrap();
    assert_eq!(mapped[0].definition_id, outdated.id);
}

#[tokio::test]
async fn rotation_aborts_after_exactly_one_refresh() {
    let pool = create_test_pool().await.unwrap();
    let credential = seed_curator(&pool, "curator-user").await;

    let playlists = SqlitePlaylistRepository::new(pool.clone());
    let definition = PlaylistDefinition::new("top-weekly", "Weekly top", true);
    playlists.insert_definition(&definition).await.unwrap();

    let refreshed = credential.with_tokens("fresh-curator", "curator-refresh", None);
    let mut refresher = MockRefresher::new();
    let returned = refreshed.clone();
    refresher
        .expect_refresh()
        .times(1)
        .returning(move |_| Ok(Some(returned.clone())));

    let mut api = MockApi::new();
    api.expect_create_playlist()
        .times(2) // once per attempt, never a third
        .returning(|_, _, _| Err(SpotifyError::Unauthorized));

    let rotation = PlaylistRotation::new(pool.clone(), Arc::new(refresher), Arc::new(api));
    let report = rotation.run_cycle().await.unwrap();
    assert!(report.aborted);
    assert_eq!(report.created, 0);

    // Nothing was mapped.
    assert!(playlists.mapped_definitions().await.unwrap().is_empty());
}

#[tokio::test]
async fn degraded_playlist_creation_aborts_the_cycle() {
    let pool = create_test_pool().await.unwrap();
    seed_curator(&pool, "curator-user").await;

    let playlists = SqlitePlaylistRepository::new(pool.clone());
    let definition = PlaylistDefinition::new("top-weekly", "Weekly top", true);
    playlists.insert_definition(&definition).await.unwrap();

    let mut api = MockApi::new();
    api.expect_create_playlist()
        .times(1)
        .returning(|_, _, _| Ok(None));

    let rotation = PlaylistRotation::new(pool, Arc::new(no_refresh()), Arc::new(api));
    let result = rotation.run_cycle().await;
    assert!(matches!(result, Err(SyncError::RemoteCreateFailed(_))));
}

#[tokio::test]
async fn rotation_requires_a_curator_credential() {
    let pool = create_test_pool().await.unwrap();

    let rotation = PlaylistRotation::new(
        pool,
        Arc::new(no_refresh()),
        Arc::new(MockApi::new()),
    );
    let result = rotation.run_cycle().await;
    assert!(matches!(result, Err(SyncError::NoCuratorCredential)));
}

#[tokio::test]
async fn rotation_requires_a_linked_curator() {
    let pool = create_test_pool().await.unwrap();

    let mut credential = Credential::new("curator-token", "curator-refresh");
    credential.is_curator = true;
    SqliteCredentialStore::new(pool.clone())
        .insert(&credential)
        .await
        .unwrap();

    let rotation = PlaylistRotation::new(
        pool,
        Arc::new(no_refresh()),
        Arc::new(MockApi::new()),
    );
    let result = rotation.run_cycle().await;
    assert!(matches!(result, Err(SyncError::CuratorNotLinked)));
}
