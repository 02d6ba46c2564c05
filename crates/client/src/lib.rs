//! Client side of mediaserver.
//!
//! This crate provides the outbound HTTP fetch pipeline, streaming metadata
//! extraction, thumbnail rendering, and the orchestrator that ties them to
//! the artifact cache.

pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod render;

pub use extract::{SiteInfoExtractor, extract, extract_str, resolve_image_urls};
pub use fetch::{Accept, FetchClient, FetchConfig, FetchResponse};
pub use pipeline::{MAX_IMAGE_ATTEMPTS, MediaPipeline};
pub use render::{RenderConfig, ThumbnailRenderer};
