//! # Catalog & History Module
//!
//! Owns the canonical service database and provides repository patterns for
//! data access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema and migrations (catalog, listeners, playlists)
//! - Repository patterns for artists, albums, tracks, users, play history,
//!   and playlist definitions
//! - Conditional (insert-if-absent) catalog writes
//! - The per-user sync watermark with a monotonicity guard

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{CatalogError, Result};
