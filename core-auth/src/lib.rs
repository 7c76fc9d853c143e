//! # Authentication Module
//!
//! Stored credentials and token refresh for the streaming service.
//!
//! ## Overview
//!
//! Credentials are rows in the service database: one per synced listener,
//! plus a curator credential used by playlist rotation. A credential is
//! mutated only by token refresh (and a one-time user link after the first
//! profile fetch). Refresh exchanges the long-lived refresh token for a new
//! access token via the accounts endpoint; an invalid refresh token yields
//! `Ok(None)`, which callers treat as "abandon this credential for the cycle".

pub mod error;
pub mod refresher;
pub mod store;
pub mod types;

pub use error::{AuthError, Result};
pub use refresher::{SpotifyTokenRefresher, TokenRefresher};
pub use store::{CredentialStore, SqliteCredentialStore};
pub use types::Credential;
