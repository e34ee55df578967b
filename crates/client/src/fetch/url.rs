//! Target URL construction and parsing.

use davatar_core::Domain;

/// Error type for URL parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Turn a discovered image reference into an absolute URL.
///
/// `http://` and `https://` URLs are returned unchanged. Anything else is a
/// path on the domain itself: one leading `/` is dropped and the rest is
/// appended to `http://<domain>/`.
pub fn normalize_candidate(domain: &Domain, candidate: &str) -> String {
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        return candidate.to_string();
    }
    let path = candidate.strip_prefix('/').unwrap_or(candidate);
    format!("http://{domain}/{path}")
}

/// Parse a URL that is about to be fetched.
///
/// Only `http` and `https` are accepted.
pub fn parse_http_url(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}
