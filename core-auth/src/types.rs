//! Credential types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored credential for the streaming service.
///
/// `user_id` is unset until the first successful profile fetch links the
/// credential to a user row. `expires_at_ms` is unset for credentials
/// imported before expiry tracking existed; such credentials are treated as
/// non-expired and rely on the bounded refresh-and-retry path instead.
///
/// The `Debug` implementation redacts token material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Credential {
    pub id: String,
    pub user_id: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at_ms: Option<i64>,
    pub is_curator: bool,
}

impl Credential {
    /// Create a new unlinked credential
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at_ms: None,
            is_curator: false,
        }
    }

    /// Whether the access token has expired as of now.
    ///
    /// A credential without a recorded expiry is treated as non-expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp_millis())
    }

    /// Whether the access token has expired as of `now_ms`
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expires_at_ms {
            Some(expires_at_ms) => expires_at_ms <= now_ms,
            None => false,
        }
    }

    /// Copy of this credential with fresh token material
    pub fn with_tokens(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at_ms: Option<i64>,
    ) -> Self {
        Self {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at_ms,
            is_curator: self.is_curator,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .field("is_curator", &self.is_curator)
            .finish()
    }
}
