//! HTTP fetch pipeline with SSRF protection and size limits.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `http`)
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### SSRF & Safety Gates
//! - Deny private ranges (RFC1918, link-local, localhost, etc.)
//! - Resolve DNS and validate all A/AAAA answers are public.
//! - Redirects are followed by hand; every hop is re-checked.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Streaming
//! - `open` returns as soon as headers arrive; the body is pulled chunk
//!   by chunk so callers can stop reading early.

pub mod ssrf;
pub mod url;

use bytes::{Bytes, BytesMut};
use reqwest::Url;
use reqwest::{Client, StatusCode, header, redirect};
use std::time::Duration;

pub use ssrf::SsrfError;
pub use url::{UrlError, canonicalize};

use mediaserver_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "mediaserver/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Skip the SSRF gate (default: false)
    pub allow_private_networks: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "mediaserver/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            allow_private_networks: false,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            allow_private_networks: config.allow_private_networks,
            ..Default::default()
        }
    }
}

/// Content types a request is willing to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// First fetch of a target: anything goes.
    Any,
    /// Representative image fetch: only `image/*`.
    Image,
}

impl Accept {
    fn header_value(self) -> &'static str {
        match self {
            Accept::Any => "*/*",
            Accept::Image => "image/*",
        }
    }
}

/// An open response whose body has not been read yet.
#[derive(Debug)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    response: reqwest::Response,
    max_bytes: usize,
    received: usize,
}

impl FetchResponse {
    /// Lowercased media type without parameters (`text/html; charset=utf-8` → `text/html`).
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(media_type)
    }

    /// Whether the origin declared an HTML document.
    pub fn is_html(&self) -> bool {
        self.media_type()
            .is_some_and(|t| t == "text/html" || t == "application/xhtml+xml")
    }

    /// Whether the origin declared an image.
    pub fn is_image(&self) -> bool {
        self.media_type().is_some_and(|t| t.starts_with("image/"))
    }

    /// Next body chunk, or `None` at end of stream.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, Error> {
        let chunk = self.response.chunk().await.map_err(|e| transport_error(&e))?;
        if let Some(bytes) = &chunk {
            self.received += bytes.len();
            if self.received > self.max_bytes {
                return Err(Error::FetchTooLarge(format!("body exceeds {} bytes", self.max_bytes)));
            }
        }
        Ok(chunk)
    }

    /// Read the remaining body into memory.
    pub async fn bytes(mut self) -> Result<Bytes, Error> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

/// Lowercased media type of a Content-Type value.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn transport_error(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::HttpError(format!("network error: {err}"))
    }
}

/// HTTP fetch client with safety checks.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    ///
    /// Redirects are followed by [`Self::open`] so every hop passes the SSRF
    /// gate, not by reqwest.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    async fn check_ssrf(&self, url: &Url) -> Result<(), Error> {
        if self.config.allow_private_networks {
            return Ok(());
        }
        ssrf::validate_url(url)
            .await
            .map_err(|e| Error::SsrfBlocked(format!("{url}: {e}")))
    }

    /// Resolve a `Location` header against the current URL and gate it.
    async fn next_hop(&self, current: &Url, location: &str) -> Result<Url, Error> {
        let next = current
            .join(location)
            .map_err(|e| Error::InvalidUrl(format!("redirect to {location}: {e}")))?;
        if !matches!(next.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!("redirect to unsupported scheme: {next}")));
        }
        self.check_ssrf(&next).await?;
        Ok(next)
    }

    /// Send a GET and return once the response headers arrive.
    ///
    /// Follows up to `max_redirects` redirects, running the SSRF check on
    /// every hop. Rejects non-2xx statuses and declared bodies larger than
    /// `max_bytes`.
    pub async fn open(&self, url: &Url, accept: Accept) -> Result<FetchResponse, Error> {
        self.check_ssrf(url).await?;

        let mut current = url.clone();
        let mut redirects = 0;
        let response = loop {
            let response = self
                .http
                .get(current.as_str())
                .header(header::ACCEPT, accept.header_value())
                .send()
                .await
                .map_err(|e| transport_error(&e))?;

            if !response.status().is_redirection() {
                break response;
            }
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let Some(location) = location else {
                break response;
            };
            if redirects >= self.config.max_redirects {
                return Err(Error::HttpError(format!("too many redirects from {url}")));
            }

            let next = self.next_hop(&current, &location).await?;
            tracing::debug!(from = %current, to = %next, status = response.status().as_u16(), "following redirect");
            current = next;
            redirects += 1;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {} from {}", status.as_u16(), url)));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        tracing::debug!(
            url = %url,
            final_url = %current,
            status = status.as_u16(),
            content_type = content_type.as_deref().unwrap_or(""),
            "response headers received"
        );

        Ok(FetchResponse {
            url: url.clone(),
            final_url: current,
            status,
            content_type,
            response,
            max_bytes: self.config.max_bytes,
            received: 0,
        })
    }

    /// Fetch an image, refusing any response not declared as `image/*`.
    pub async fn fetch_image(&self, url: &Url) -> Result<Bytes, Error> {
        let response = self.open(url, Accept::Image).await?;
        if !response.is_image() {
            return Err(Error::UnsupportedContent(format!(
                "unsupported image content type: {} ({})",
                response.content_type.as_deref().unwrap_or("none"),
                url
            )));
        }
        response.bytes().await
    }
}
