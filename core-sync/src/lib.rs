//! # Sync & Rotation Module
//!
//! The orchestration core: ingesting listening history and rotating the
//! auto-curated top playlists.
//!
//! ## Components
//!
//! - **History Sync** (`sync`): per-credential ingest — fetch recently played
//!   since the watermark, backfill the catalog, append play events, advance
//!   the watermark, backfill artist images
//! - **Playlist Rotation** (`rotation`): create remote playlists for newly
//!   active top-lists and rotate superseded ones into their stable remote
//!   counterparts
//! - **Auth Retry State Machine** (`retry`): the bounded
//!   refresh-once-then-abandon policy shared by both orchestrators
//!
//! Processing is strictly sequential: credentials one at a time, playlist
//! pairs one at a time. One credential's unrecoverable failure never aborts
//! the remaining credentials.

pub mod error;
pub mod retry;
pub mod rotation;
pub mod sync;

pub use error::{Result, SyncError};
pub use retry::AuthAttempt;
pub use rotation::{PlaylistRotation, RemoteBinding, RotationReport};
pub use sync::{CycleReport, HistorySync};
