//! The cache-backed media pipeline.
//!
//! `Fetching → Classifying → {ExtractingMetadata | Rendering}
//! → [ResolvingImage → Rendering] → Caching → Done`
//!
//! Failures before an artifact exists are returned as errors and never
//! cached. A page that parsed but yielded no thumbnail becomes
//! [`Artifact::Unavailable`], which is cached with the short TTL.

use std::fmt;
use std::sync::Arc;

use mediaserver_core::cache::normalize_key;
use mediaserver_core::{Artifact, ArtifactStore, Error, SiteMetadata, Thumbnail, TtlPolicy};
use url::Url;

use crate::extract::{SiteInfoExtractor, resolve_image_urls};
use crate::fetch::{Accept, FetchClient, FetchResponse, canonicalize};
use crate::render::ThumbnailRenderer;

/// Upper bound on image candidates tried for one page.
pub const MAX_IMAGE_ATTEMPTS: usize = 4;

/// Pipeline state, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetching,
    Classifying,
    ExtractingMetadata,
    ResolvingImage,
    Rendering,
    Caching,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Classifying => "classifying",
            Stage::ExtractingMetadata => "extracting_metadata",
            Stage::ResolvingImage => "resolving_image",
            Stage::Rendering => "rendering",
            Stage::Caching => "caching",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage, url: &str) {
    tracing::debug!(stage = %stage, url = %url, "pipeline stage");
}

/// Fetches, classifies, renders, and caches one target per call.
#[derive(Clone)]
pub struct MediaPipeline {
    fetch: FetchClient,
    renderer: ThumbnailRenderer,
    store: Arc<dyn ArtifactStore>,
    ttl: TtlPolicy,
}

impl fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("fetch", &self.fetch)
            .field("renderer", &self.renderer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl MediaPipeline {
    pub fn new(fetch: FetchClient, renderer: ThumbnailRenderer, store: Arc<dyn ArtifactStore>, ttl: TtlPolicy) -> Self {
        Self { fetch, renderer, store, ttl }
    }

    /// Return the cached artifact for `target`, computing and caching it on
    /// a miss.
    pub async fn process(&self, target: &str) -> Result<Artifact, Error> {
        let key = normalize_key(target);

        match self.store.get(&key).await {
            Ok(Some(artifact)) => {
                tracing::debug!(key = %key, kind = artifact.kind(), "cache hit");
                return Ok(artifact);
            }
            Ok(None) => tracing::debug!(key = %key, "cache miss"),
            Err(e) => tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss"),
        }

        let artifact = self.compute(target).await?;

        enter(Stage::Caching, target);
        let ttl = self.ttl.ttl_for(&artifact);
        match self.store.put(&key, &artifact, ttl).await {
            Ok(true) => tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "artifact cached"),
            Ok(false) => tracing::debug!(key = %key, "artifact already cached by another request"),
            Err(e) => tracing::warn!(key = %key, error = %e, "cache write failed"),
        }

        enter(Stage::Done, target);
        Ok(artifact)
    }

    /// Compute the artifact for `target` without touching the cache.
    pub async fn compute(&self, target: &str) -> Result<Artifact, Error> {
        let url = canonicalize(target).map_err(|e| Error::InvalidUrl(format!("{target}: {e}")))?;

        enter(Stage::Fetching, url.as_str());
        let response = self.fetch.open(&url, Accept::Any).await?;

        enter(Stage::Classifying, url.as_str());
        if response.is_html() {
            let site = self.extract_metadata(response).await?;
            Ok(self.render_page(site).await)
        } else {
            enter(Stage::Rendering, url.as_str());
            let body = response.bytes().await?;
            let thumbnail = self.renderer.render_blocking(body, None).await?;
            Ok(Artifact::Image { thumbnail })
        }
    }

    /// Stream the page body into the extractor, stopping as soon as it has
    /// seen enough.
    async fn extract_metadata(&self, mut response: FetchResponse) -> Result<SiteMetadata, Error> {
        enter(Stage::ExtractingMetadata, response.url.as_str());

        let mut extractor = SiteInfoExtractor::new();
        loop {
            let chunk = response.chunk().await.map_err(|e| match e {
                Error::FetchTooLarge(_) => e,
                other => Error::ParseFailed(format!("reading {}: {other}", response.url)),
            })?;
            match chunk {
                Some(bytes) => {
                    if extractor.feed(&bytes).is_break() {
                        tracing::debug!(url = %response.url, "metadata complete, stopped reading early");
                        break;
                    }
                }
                None => break,
            }
        }

        let mut site = extractor.finish();
        if site.canonical_url.is_empty() {
            site.canonical_url = response.url.to_string();
        }
        resolve_image_urls(&mut site, &response.final_url);
        Ok(site)
    }

    /// Try image candidates in order until one renders.
    async fn render_page(&self, site: SiteMetadata) -> Artifact {
        if site.image_candidates.is_empty() {
            return Artifact::Unavailable { site: Some(site), reason: "no image candidates".into() };
        }

        let caption = (!site.title.is_empty()).then_some(site.title.as_str());
        let mut rendered = None;
        let mut last_error = None;
        for candidate in site.image_candidates.iter().take(MAX_IMAGE_ATTEMPTS) {
            enter(Stage::ResolvingImage, candidate);
            match self.render_candidate(candidate, caption).await {
                Ok(thumbnail) => {
                    rendered = Some(thumbnail);
                    break;
                }
                Err(e) => {
                    tracing::warn!(image = %candidate, error = %e, "image candidate failed");
                    last_error = Some(e);
                }
            }
        }

        match rendered {
            Some(thumbnail) => Artifact::Page { site, thumbnail },
            None => {
                let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
                Artifact::Unavailable { site: Some(site), reason }
            }
        }
    }

    async fn render_candidate(&self, candidate: &str, caption: Option<&str>) -> Result<Thumbnail, Error> {
        let image_url = Url::parse(candidate).map_err(|e| Error::InvalidUrl(format!("{candidate}: {e}")))?;
        let bytes = self.fetch.fetch_image(&image_url).await?;
        enter(Stage::Rendering, candidate);
        self.renderer.render_blocking(bytes, caption.map(str::to_string)).await
    }
}
