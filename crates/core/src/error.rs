//! Unified error types for mediaserver.

use tokio_rusqlite::rusqlite;

/// Unified error types for the media pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty target).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// SSRF blocked - private/internal address not allowed.
    #[error("SSRF_BLOCKED: {0}")]
    SsrfBlocked(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Origin unreachable or answered with an error status.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Response is neither HTML nor an image we can handle.
    #[error("UNSUPPORTED_CONTENT: {0}")]
    UnsupportedContent(String),

    /// The HTML stream failed while being read.
    #[error("PARSE_FAILED: {0}")]
    ParseFailed(String),

    /// Image bytes are not in a supported format.
    #[error("DECODE_FAILED: {0}")]
    DecodeFailed(String),

    /// Thumbnail encoding failed.
    #[error("ENCODE_FAILED: {0}")]
    EncodeFailed(String),

    /// Page parsed but no candidate image produced a thumbnail.
    #[error("NO_THUMBNAIL: {0}")]
    NoThumbnail(String),

    /// The render task panicked or was cancelled.
    #[error("RENDER_ABORTED: {0}")]
    RenderAborted(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored row could not be turned back into an artifact.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
