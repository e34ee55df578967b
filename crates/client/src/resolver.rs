//! Network-backed avatar resolution.
//!
//! One resolution is two requests: the homepage, whose head is scanned for
//! an image declaration, and the chosen image URL, which must answer 200.
//! A homepage whose head never closes ends the resolution after the first.

use async_trait::async_trait;
use reqwest::StatusCode;

use davatar_core::{AppConfig, Domain, Error, Resolve, ResolvedUrl};

use crate::fetch::{FetchClient, FetchConfig, FetchError, normalize_candidate, parse_http_url};
use crate::scan::{ScanOutcome, scan_head};

/// Scan a homepage and return the normalized candidate URL along with the
/// scan details. No candidate when the head was never closed.
pub fn candidate_from_html(domain: &Domain, html: &str) -> (Option<String>, ScanOutcome) {
    let outcome = scan_head(html);
    let candidate = outcome.candidate().map(|raw| normalize_candidate(domain, raw));
    (candidate, outcome)
}

/// [`Resolve`] implementation that talks to the domain over HTTP.
pub struct AvatarResolver {
    fetch: FetchClient,
}

impl AvatarResolver {
    pub fn new(fetch: FetchClient) -> Self {
        Self { fetch }
    }

    /// Build a resolver with a fetch client configured from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self::new(FetchClient::new(FetchConfig::from(config))?))
    }

    /// Fetch the homepage of `domain` and pick the candidate image URL.
    ///
    /// The homepage status is ignored; error pages get scanned too. The URL
    /// comes back in its serialized form, so control characters decoded from
    /// the markup never reach the cache.
    pub async fn find_candidate(&self, domain: &Domain) -> Result<Option<String>, FetchError> {
        let page = self.fetch.fetch_page(&domain.homepage_url()).await?;
        let html = String::from_utf8_lossy(&page.bytes);
        let (candidate, outcome) = candidate_from_html(domain, &html);

        tracing::debug!(
            %domain,
            status = page.status.as_u16(),
            fetch_ms = page.fetch_ms,
            final_url = %page.final_url,
            content_type = page.content_type.as_deref().unwrap_or(""),
            truncated = page.truncated,
            stop = ?outcome.stop,
            category = outcome.candidates.select().map(|(c, _)| c.name()),
            candidate = candidate.as_deref().unwrap_or(""),
            "scanned homepage head"
        );

        Ok(candidate.map(|raw| parse_http_url(&raw)).transpose()?.map(|url| url.to_string()))
    }

    /// Whether `url` answers exactly 200 after redirects.
    pub async fn validate(&self, url: &str) -> Result<bool, FetchError> {
        let status = self.fetch.probe(url).await?;
        if status != StatusCode::OK {
            tracing::debug!(url, status = status.as_u16(), "candidate rejected");
        }
        Ok(status == StatusCode::OK)
    }
}

#[async_trait]
impl Resolve for AvatarResolver {
    async fn resolve(&self, domain: &Domain) -> ResolvedUrl {
        let candidate = match self.find_candidate(domain).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return ResolvedUrl::not_found(),
            Err(e) => {
                tracing::debug!(%domain, error = %e, "homepage fetch failed");
                return ResolvedUrl::not_found();
            }
        };

        match self.validate(&candidate).await {
            Ok(true) => ResolvedUrl::found(candidate),
            Ok(false) => ResolvedUrl::not_found(),
            Err(e) => {
                tracing::debug!(%domain, %candidate, error = %e, "candidate fetch failed");
                ResolvedUrl::not_found()
            }
        }
    }
}
