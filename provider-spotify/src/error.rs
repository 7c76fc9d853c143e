//! Error types for the Spotify provider

use thiserror::Error;

/// Spotify provider errors.
///
/// Only failures the caller must act on surface here. Rate limits and
/// timeouts are absorbed by the client's retry loop until the attempt budget
/// runs out; other non-success responses degrade to `Ok(None)`.
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// The access token was rejected. Never retried internally; the caller
    /// owns credential refresh.
    #[error("Access token rejected by the service")]
    Unauthorized,

    /// The retry budget for rate-limit/timeout recovery ran out.
    #[error("Call abandoned after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Request construction failed (serialization)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for Spotify operations
pub type Result<T> = std::result::Result<T, SpotifyError>;
