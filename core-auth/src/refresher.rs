//! Token refresh against the accounts endpoint
//!
//! Exchanges a credential's refresh token for a new access token using the
//! `refresh_token` grant with HTTP Basic client authentication. The service
//! may or may not rotate the refresh token; when the response omits one, the
//! stored refresh token stays valid and is kept.

use crate::error::{AuthError, Result};
use crate::types::Credential;
use async_trait::async_trait;
use bytes::Bytes;
use core_runtime::config::SpotifyApiConfig;
use core_runtime::http::{HttpClient, HttpMethod, HttpRequest};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for token endpoint requests
const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Credential refresher interface
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange the credential's refresh token for fresh token material.
    ///
    /// # Returns
    /// - `Ok(Some(credential))` with the new tokens on success
    /// - `Ok(None)` when the token endpoint rejects the refresh token (the
    ///   credential must be abandoned for the cycle)
    /// - `Err` on transport failure
    async fn refresh(&self, credential: &Credential) -> Result<Option<Credential>>;
}

/// Refresher backed by the streaming service's accounts endpoint
pub struct SpotifyTokenRefresher {
    http_client: Arc<dyn HttpClient>,
    config: SpotifyApiConfig,
}

impl SpotifyTokenRefresher {
    /// Create a new refresher
    pub fn new(http_client: Arc<dyn HttpClient>, config: SpotifyApiConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// HTTP Basic authorization header value from the client credentials
    fn basic_auth_header(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        let raw = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", STANDARD.encode(raw.as_bytes()))
    }
}

#[async_trait]
impl TokenRefresher for SpotifyTokenRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<Option<Credential>> {
        debug!(credential_id = %credential.id, "Refreshing access token");

        let mut form = HashMap::new();
        form.insert("grant_type", "refresh_token");
        form.insert("refresh_token", credential.refresh_token.as_str());

        let encoded = serde_urlencoded::to_string(&form)
            .map_err(|e| AuthError::TokenRefreshFailed(format!("Failed to encode form: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .header("Authorization", self.basic_auth_header())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded))
            .timeout(REFRESH_TIMEOUT);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        if !response.is_success() {
            warn!(
                credential_id = %credential.id,
                status = response.status,
                "Token endpoint rejected refresh"
            );
            return Ok(None);
        }

        let tokens: TokenResponse = match response.json() {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(
                    credential_id = %credential.id,
                    error = %e,
                    "Token endpoint returned an unparseable body"
                );
                return Ok(None);
            }
        };

        let expires_at_ms =
            chrono::Utc::now().timestamp_millis() + tokens.expires_in.saturating_mul(1_000);
        let refresh_token = tokens
            .refresh_token
            .unwrap_or_else(|| credential.refresh_token.clone());

        info!(
            credential_id = %credential.id,
            expires_in = tokens.expires_in,
            "Access token refreshed"
        );

        Ok(Some(credential.with_tokens(
            tokens.access_token,
            refresh_token,
            Some(expires_at_ms),
        )))
    }
}
