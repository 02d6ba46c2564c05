//! SQLite-backed artifact cache.
//!
//! This module provides a persistent store for pipeline artifacts using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Keys derived from normalized request URLs
//! - Create-if-absent writes with per-entry expiration
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod artifacts;
pub mod connection;
pub mod key;
pub mod migrations;
pub mod store;

pub use connection::CacheDb;
pub use key::{normalize_key, url_checksum};
pub use store::{ArtifactStore, TtlPolicy};
