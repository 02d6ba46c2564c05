//! Artifacts produced by the media pipeline.
//!
//! An [`Artifact`] is the single value cached per normalized URL: page
//! metadata with a thumbnail, a bare thumbnail, or a negative outcome.

use serde::{Deserialize, Serialize};

/// MIME type of every rendered thumbnail.
pub const THUMBNAIL_MIME: &str = "image/jpeg";

/// OpenGraph-style details about a web page.
///
/// `title` keeps the first `<title>` text unless an `og:title` replaces it;
/// `images` accumulates candidates in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "url")]
    pub canonical_url: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "images")]
    pub image_candidates: Vec<String>,
}

/// Pixel dimensions of a thumbnail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

/// An encoded thumbnail image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub bounds: Bounds,
}

/// The cached result of processing a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// An HTML page whose representative image rendered successfully.
    Page { site: SiteMetadata, thumbnail: Thumbnail },

    /// A non-HTML body rendered directly.
    Image { thumbnail: Thumbnail },

    /// No thumbnail could be produced. Parsed metadata is kept when the
    /// page itself was readable.
    Unavailable { site: Option<SiteMetadata>, reason: String },
}

impl Artifact {
    /// Storage discriminator used by the cache.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Page { .. } => "page",
            Self::Image { .. } => "image",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        match self {
            Self::Page { thumbnail, .. } | Self::Image { thumbnail } => Some(thumbnail),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn site(&self) -> Option<&SiteMetadata> {
        match self {
            Self::Page { site, .. } => Some(site),
            Self::Unavailable { site, .. } => site.as_ref(),
            Self::Image { .. } => None,
        }
    }

    /// Whether the artifact carries thumbnail bytes.
    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail().is_some_and(|t| !t.bytes.is_empty())
    }
}
