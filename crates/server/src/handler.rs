//! Router and request handler.
//!
//! ## Routes
//!
//! - `GET /favicon.ico` - fixed 404
//! - `GET /` - 400, no target
//! - `GET /{target}` - thumbnail, or metadata JSON when the client accepts
//!   `application/json`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use mediaserver_client::MediaPipeline;
use mediaserver_core::Error;

use crate::error::WebError;
use crate::response::{image_response, metadata_response};

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: Arc<MediaPipeline>,
    deadline: Duration,
}

impl AppState {
    pub fn new(pipeline: MediaPipeline, deadline: Duration) -> Self {
        Self { pipeline: Arc::new(pipeline), deadline }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/favicon.ico", get(not_found))
        .route("/", get(missing_target))
        .route("/{*target}", get(media))
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

async fn missing_target() -> Result<Response, WebError> {
    Err(Error::InvalidInput("missing target url".into()).into())
}

/// Resolve the target embedded in the request path.
async fn media(State(state): State<AppState>, request: Request) -> Result<Response, WebError> {
    let (parts, _body) = request.into_parts();
    let headers = &parts.headers;
    let raw = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let target = raw.strip_prefix('/').unwrap_or(raw);

    tracing::info!(client = %client_ip(&parts), uri = %raw, "media request");

    if target.is_empty() {
        return Err(Error::InvalidInput("missing target url".into()).into());
    }
    if let Some(stripped) = strip_scheme(target) {
        return Ok(Redirect::to(&format!("/{stripped}")).into_response());
    }

    let wants_json = accepts_json(headers);
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string();

    let artifact = tokio::time::timeout(state.deadline, state.pipeline.process(target))
        .await
        .map_err(|_| WebError::Timeout(state.deadline))??;

    let response = if wants_json { metadata_response(artifact, target, &host)? } else { image_response(artifact)? };
    Ok(response)
}

/// Target without a leading `http://` or `https://` (or their
/// slash-collapsed `http:/` forms).
fn strip_scheme(target: &str) -> Option<&str> {
    let (scheme, rest) = target.split_once(":/")?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return None;
    }
    Some(rest.strip_prefix('/').unwrap_or(rest))
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("application/json"))
}

/// `X-Real-IP` when a proxy set it, otherwise the peer address.
fn client_ip(parts: &Parts) -> String {
    if let Some(ip) = parts.headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.to_string();
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string())
}
