//! # Configuration Module
//!
//! Typed configuration for the sync service with fail-fast validation.
//!
//! ## Overview
//!
//! Two configuration surfaces live here:
//!
//! - [`SpotifyApiConfig`] — the client credentials used for the token-refresh
//!   grant. Required settings are read from the environment and a missing
//!   value aborts startup with an actionable error, before any orchestrator
//!   runs.
//! - [`SyncTuning`] — knobs for the sync cycle (history page size, retry
//!   budget). All fields have production defaults; tests override them with
//!   small values.
//!
//! ## Usage
//!
//! ```no_run
//! use core_runtime::config::SpotifyApiConfig;
//!
//! let api = SpotifyApiConfig::from_env().expect("SPOTIFY_CLIENT_ID/SECRET must be set");
//! ```

use crate::error::{Error, Result};
use std::time::Duration;

/// Environment variable holding the OAuth client id.
const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";

/// Environment variable holding the OAuth client secret.
const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";

/// Client credentials for the streaming service's accounts endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct SpotifyApiConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Web API base URL
    pub api_base_url: String,
}

impl std::fmt::Debug for SpotifyApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyApiConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl SpotifyApiConfig {
    /// Build a configuration from explicit values.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            api_base_url: "https://api.spotify.com/v1".to_string(),
        }
    }

    /// Read the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the missing variable when
    /// `SPOTIFY_CLIENT_ID` or `SPOTIFY_CLIENT_SECRET` is not set. This is the
    /// fail-fast path: hosts should call this during startup and abort on
    /// error.
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var(CLIENT_ID_VAR)
            .map_err(|_| Error::Config(format!("{} environment variable not set", CLIENT_ID_VAR)))?;
        let client_secret = std::env::var(CLIENT_SECRET_VAR).map_err(|_| {
            Error::Config(format!("{} environment variable not set", CLIENT_SECRET_VAR))
        })?;

        let config = Self::new(client_id, client_secret);
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(Error::Config("client_id cannot be empty".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(Error::Config("client_secret cannot be empty".to_string()));
        }
        if !self.token_url.starts_with("https://") && !self.token_url.starts_with("http://") {
            return Err(Error::Config(format!(
                "token_url must be an http(s) URL, got '{}'",
                self.token_url
            )));
        }
        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://") {
            return Err(Error::Config(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }
        Ok(())
    }

    /// Override the token endpoint (tests, proxies).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Tuning knobs for the sync and rotation cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTuning {
    /// Maximum recently-played items requested per fetch. The service caps
    /// this at 50; values above the cap are clamped by the service, not here.
    pub history_page_size: u32,

    /// Maximum attempts for a single remote call before giving up
    /// (rate-limit and timeout retries included).
    pub max_call_attempts: u32,

    /// Delay applied when the service gives no retry hint.
    pub default_retry_delay: Duration,

    /// Ceiling for any single retry delay, including server-supplied ones.
    pub max_retry_delay: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            history_page_size: 50,
            max_call_attempts: 5,
            default_retry_delay: Duration::from_secs(300),
            max_retry_delay: Duration::from_secs(300),
        }
    }
}

impl SyncTuning {
    /// Set the history page size
    pub fn history_page_size(mut self, size: u32) -> Self {
        self.history_page_size = size;
        self
    }

    /// Set the per-call attempt budget
    pub fn max_call_attempts(mut self, attempts: u32) -> Self {
        self.max_call_attempts = attempts;
        self
    }

    /// Set the default retry delay
    pub fn default_retry_delay(mut self, delay: Duration) -> Self {
        self.default_retry_delay = delay;
        self
    }

    /// Set the retry delay ceiling
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Validate the tuning values.
    pub fn validate(&self) -> Result<()> {
        if self.history_page_size == 0 {
            return Err(Error::Config(
                "history_page_size must be greater than 0".to_string(),
            ));
        }
        if self.max_call_attempts == 0 {
            return Err(Error::Config(
                "max_call_attempts must be greater than 0".to_string(),
            ));
        }
        if self.max_retry_delay < self.default_retry_delay {
            return Err(Error::Config(
                "max_retry_delay must be at least default_retry_delay".to_string(),
            ));
        }
        Ok(())
    }
}
