//! Request handlers.
//!
//! Every avatar route ends in a `302 Found`: to the resolved image when the
//! domain has one, otherwise to the fallback provider with the requested
//! size and default.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use url::Url;

use davatar_core::{AppConfig, AvatarCache, Domain};

use crate::error::WebError;

/// Size passed to the fallback provider when the path has none.
pub const DEFAULT_SIZE: u32 = 21;

/// Default image style passed to the fallback provider when the path has none.
pub const DEFAULT_STYLE: &str = "mm";

/// Shared state of the front end.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    cache: AvatarCache,
    fallback: Url,
    index_redirect: Option<String>,
}

impl AppState {
    pub fn new(cache: AvatarCache, config: &AppConfig) -> Result<Self, url::ParseError> {
        let fallback = Url::parse(&config.fallback_url)?;
        Ok(Self { inner: Arc::new(Inner { cache, fallback, index_redirect: config.index_redirect.clone() }) })
    }

    /// `<fallback_url>?s=<size>&f=d&d=<default>`, query values encoded.
    pub fn fallback_location(&self, size: u32, default: &str) -> String {
        let mut url = self.inner.fallback.clone();
        url.query_pairs_mut()
            .append_pair("s", &size.to_string())
            .append_pair("f", "d")
            .append_pair("d", default);
        url.into()
    }
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Parse a size segment. Only plain decimal digits count.
fn parse_size(segment: &str) -> Result<u32, WebError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WebError::NotFound(format!("size must be a number: {segment:?}")));
    }
    segment.parse().map_err(|_| WebError::NotFound(format!("size out of range: {segment}")))
}

async fn serve_avatar(state: &AppState, domain: &str, size: u32, default: &str) -> Result<Response, WebError> {
    let domain = Domain::parse(domain)?;
    let resolved = state.inner.cache.get_avatar_url(&domain).await?;

    let location = match resolved.url() {
        Some(url) => url.to_string(),
        None => state.fallback_location(size, default),
    };
    tracing::debug!(%domain, found = resolved.is_found(), %location, "redirecting");

    Ok(found(&location))
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Result<Response, WebError> {
    match &state.inner.index_redirect {
        Some(target) => Ok(found(target)),
        None => Err(WebError::NotFound("no index page".into())),
    }
}

/// `GET /avatar/{domain}/`
pub async fn avatar(State(state): State<AppState>, Path(domain): Path<String>) -> Result<Response, WebError> {
    serve_avatar(&state, &domain, DEFAULT_SIZE, DEFAULT_STYLE).await
}

/// `GET /avatar/{domain}/{size}/`
pub async fn avatar_sized(
    State(state): State<AppState>, Path((domain, size)): Path<(String, String)>,
) -> Result<Response, WebError> {
    let size = parse_size(&size)?;
    serve_avatar(&state, &domain, size, DEFAULT_STYLE).await
}

/// `GET /avatar/{domain}/{size}/{default}/`
pub async fn avatar_sized_default(
    State(state): State<AppState>, Path((domain, size, default)): Path<(String, String, String)>,
) -> Result<Response, WebError> {
    let size = parse_size(&size)?;
    serve_avatar(&state, &domain, size, &default).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use davatar_core::cache::MemoryStore;
    use davatar_core::{Resolve, ResolvedUrl};

    struct Fixed(ResolvedUrl);

    #[async_trait::async_trait]
    impl Resolve for Fixed {
        async fn resolve(&self, _domain: &Domain) -> ResolvedUrl {
            self.0.clone()
        }
    }

    fn state(config: &AppConfig) -> AppState {
        let cache = AvatarCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Fixed(ResolvedUrl::not_found())),
            Duration::from_secs(60),
        );
        AppState::new(cache, config).unwrap()
    }

    #[test]
    fn test_fallback_location_default() {
        let state = state(&AppConfig::default());
        assert_eq!(state.fallback_location(21, "mm"), "http://gravatar.com/avatar/?s=21&f=d&d=mm");
    }

    #[test]
    fn test_fallback_location_encodes_default() {
        let state = state(&AppConfig::default());
        let location = state.fallback_location(40, "http://example.test/a b.png");
        assert_eq!(location, "http://gravatar.com/avatar/?s=40&f=d&d=http%3A%2F%2Fexample.test%2Fa+b.png");
    }

    #[test]
    fn test_fallback_location_keeps_existing_query() {
        let config = AppConfig { fallback_url: "https://avatars.example.net/a?r=g".into(), ..AppConfig::default() };
        let state = state(&config);
        assert_eq!(state.fallback_location(60, "wavatar"), "https://avatars.example.net/a?r=g&s=60&f=d&d=wavatar");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("60").unwrap(), 60);
        assert!(matches!(parse_size("big"), Err(WebError::NotFound(_))));
        assert!(matches!(parse_size("+5"), Err(WebError::NotFound(_))));
        assert!(matches!(parse_size(""), Err(WebError::NotFound(_))));
        assert!(matches!(parse_size("99999999999"), Err(WebError::NotFound(_))));
    }
}
