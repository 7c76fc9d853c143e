//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync service:
//! - Logging and tracing infrastructure
//! - Configuration management with fail-fast validation
//! - HTTP client abstraction with a reqwest-backed default
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on. It
//! establishes the logging conventions, the typed configuration surface, and
//! the HTTP seam through which every remote call is made (and through which
//! tests substitute mock transports).

pub mod config;
pub mod error;
pub mod http;
pub mod logging;

pub use config::{SpotifyApiConfig, SyncTuning};
pub use error::{Error, Result};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};
