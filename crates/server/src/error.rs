//! Structured errors for the davatar front end.
//!
//! Each variant maps to one HTTP status; the body is the display string.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Structured errors for the davatar front end.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// The domain in the path is not a usable DNS name.
    #[error("INVALID_DOMAIN: {0}")]
    InvalidDomain(String),

    /// The path does not name an avatar (e.g. a non-numeric size).
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Anything the request cannot recover from.
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::InvalidDomain(_) => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<davatar_core::Error> for WebError {
    fn from(err: davatar_core::Error) -> Self {
        match err {
            davatar_core::Error::InvalidDomain(msg) => WebError::InvalidDomain(msg),
            other => WebError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
