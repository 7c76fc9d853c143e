//! Workspace placeholder crate.
//!
//! This crate exists to anchor the workspace and re-export the orchestrator
//! entry points. Host applications (a cron-driven binary, a functions worker,
//! a systemd timer) can depend on `spinlog` and wire the orchestrators without
//! referencing each member crate individually.

pub use core_sync::{HistorySync, PlaylistRotation};
