//! HTTP-facing errors for the mediaserver binary.
//!
//! Pipeline errors keep their coded display string as the plain-text body;
//! only the status code is chosen here.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mediaserver_core::Error;

/// Errors returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// The pipeline failed or produced nothing servable.
    #[error(transparent)]
    Pipeline(#[from] Error),

    /// The request deadline elapsed before the pipeline finished.
    #[error("FETCH_TIMEOUT: request exceeded {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Pipeline(Error::NoThumbnail(_)) => StatusCode::NOT_FOUND,
            WebError::Pipeline(Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            WebError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            WebError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "request rejected");
        }
        (status, message).into_response()
    }
}
