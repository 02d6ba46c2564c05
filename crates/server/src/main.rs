//! mediaserver entry point.
//!
//! Boots the HTTP service: loads configuration, opens the artifact cache,
//! and serves link previews and thumbnails for targets embedded in the
//! request path.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::Request;
use mediaserver_client::{FetchClient, FetchConfig, MediaPipeline, RenderConfig, ThumbnailRenderer};
use mediaserver_core::{AppConfig, CacheDb, TtlPolicy};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod response;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = AppConfig::load()?;
    let addr = config.listen_addr()?;

    let db = CacheDb::open(&config.db_path).await?;
    match db.purge_expired().await {
        Ok(purged) => tracing::info!(purged, "expired artifacts removed"),
        Err(e) => tracing::warn!(error = %e, "failed to purge expired artifacts"),
    }

    let fetch = FetchClient::new(FetchConfig::from(&config))?;
    let renderer = ThumbnailRenderer::new(RenderConfig::from(&config));
    let pipeline = MediaPipeline::new(fetch, renderer, Arc::new(db), TtlPolicy::from(&config));
    let state = handler::AppState::new(pipeline, config.request_deadline());

    let app = handler::router(state).layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        tracing::span!(
            Level::INFO,
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %addr,
        size = config.thumbnail_size,
        quality = config.thumbnail_quality,
        ttl_secs = config.cache_ttl_secs,
        "starting mediaserver"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
