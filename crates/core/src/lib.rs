//! Core types and shared functionality for mediaserver.
//!
//! This crate provides:
//! - The artifact data model
//! - Cache implementation with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod artifact;
pub mod cache;
pub mod config;
pub mod error;

pub use artifact::{Artifact, Bounds, SiteMetadata, THUMBNAIL_MIME, Thumbnail};
pub use cache::{ArtifactStore, CacheDb, TtlPolicy};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
