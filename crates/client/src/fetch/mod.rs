//! HTTP fetch pipeline with SSRF protection.
//!
//! ### Requests
//! - Homepage fetch: GET, body read up to `max_bytes`, any status accepted
//! - Validation probe: GET following redirects, status only, body never read
//!
//! ### SSRF & Safety Gates
//! - Deny private ranges (RFC1918, link-local, localhost, etc.)
//! - Resolve DNS and validate all A/AAAA answers are public.
//! - Redirect hops to literal private addresses are refused.
//! - Max redirects: 5 (configurable)

pub mod ssrf;
pub mod url;

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, Url, header};

pub use ssrf::{SsrfError, check_url, validate_ip};
pub use url::{UrlError, normalize_candidate, parse_http_url};

use davatar_core::{AppConfig, Error};

/// Errors from a single outbound request.
///
/// The resolver folds every variant into "no avatar found"; the variants
/// only exist so logs say what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("refused: {0}")]
    Blocked(#[from] SsrfError),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(reqwest::Error),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() { FetchError::Timeout(timeout) } else { FetchError::Network(err) }
    }
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "davatar/0.1")
    pub user_agent: String,

    /// Maximum homepage bytes read (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 5s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Refuse private and reserved addresses (default: true)
    pub block_private_addresses: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "davatar/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(5000),
            max_redirects: 5,
            block_private_addresses: true,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            block_private_addresses: config.block_private_addresses,
        }
    }
}

/// Response from a homepage fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes, at most `max_bytes`
    pub bytes: Bytes,
    /// Whether the body was cut off at `max_bytes`
    pub truncated: bool,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect_policy(config.max_redirects, config.block_private_addresses))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpClient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Fetch a page, reading at most `max_bytes` of its body.
    ///
    /// Non-2xx responses are returned like any other; the caller decides
    /// whether the status matters.
    pub async fn fetch_page(&self, url_str: &str) -> Result<FetchResponse, FetchError> {
        let start = Instant::now();
        let url = parse_http_url(url_str)?;
        self.guard(&url).await?;

        let mut response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.config.timeout))?;

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let cap = self.config.max_bytes;
        let mut body = BytesMut::with_capacity(response.content_length().map_or(8 * 1024, |n| n as usize).min(cap));
        let mut truncated = false;

        while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::from_reqwest(e, self.config.timeout))? {
            let room = cap - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} status {} in {}ms ({} bytes{})",
            url,
            final_url,
            status.as_u16(),
            fetch_ms,
            body.len(),
            if truncated { ", truncated" } else { "" }
        );

        Ok(FetchResponse { final_url, status, content_type, bytes: body.freeze(), truncated, fetch_ms })
    }

    /// GET a URL following redirects and report the terminal status.
    ///
    /// The response body is dropped unread.
    pub async fn probe(&self, url_str: &str) -> Result<StatusCode, FetchError> {
        let url = parse_http_url(url_str)?;
        self.guard(&url).await?;

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.config.timeout))?;

        let status = response.status();
        tracing::debug!("probed {} -> {} status {}", url, response.url(), status.as_u16());
        Ok(status)
    }

    async fn guard(&self, url: &Url) -> Result<(), FetchError> {
        if !self.config.block_private_addresses {
            return Ok(());
        }
        tokio::time::timeout(self.config.timeout, check_url(url))
            .await
            .map_err(|_| FetchError::Timeout(self.config.timeout))??;
        Ok(())
    }
}

fn redirect_policy(max_redirects: usize, block_private_addresses: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(format!("more than {max_redirects} redirects"));
        }
        if block_private_addresses && let Err(e) = ssrf::check_literal_host(attempt.url()) {
            return attempt.error(e);
        }
        attempt.follow()
    })
}
