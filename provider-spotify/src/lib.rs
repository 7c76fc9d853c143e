//! # Spotify Provider
//!
//! Typed wrapper over the streaming service's Web API.
//!
//! ## Overview
//!
//! This module provides:
//! - The [`SpotifyApi`] trait consumed by the orchestrators (and mocked in
//!   their tests)
//! - [`SpotifyClient`], the `HttpClient`-backed implementation
//! - Response classification into exactly one failure tier: unauthorized
//!   (raised to the caller), rate-limit/timeout (retried internally with a
//!   bounded budget), everything else (logged and degraded to `None`)

pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::{SpotifyApi, SpotifyClient};
pub use error::{Result, SpotifyError};
pub use retry::RetryPolicy;
pub use types::{ArtistDetailsDto, ArtistSummaryDto, PlayedItemDto, TrackDto};
