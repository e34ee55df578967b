use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all davatar endpoints.
///
/// Each avatar route also answers with `davatar.jpg` in place of its
/// trailing slash, so the URL can be handed to gravatar as a `d=` image.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::index))
        .route("/avatar/:domain/", get(handler::avatar))
        .route("/avatar/:domain/davatar.jpg", get(handler::avatar))
        .route("/avatar/:domain/:size/", get(handler::avatar_sized))
        .route("/avatar/:domain/:size/davatar.jpg", get(handler::avatar_sized))
        .route("/avatar/:domain/:size/:default/", get(handler::avatar_sized_default))
        .route("/avatar/:domain/:size/:default/davatar.jpg", get(handler::avatar_sized_default))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use tower::util::ServiceExt;

    use davatar_core::cache::{CacheEntry, CacheStore, EntryKey, MemoryStore};
    use davatar_core::{AppConfig, AvatarCache, Domain, Error, Resolve, ResolvedUrl};

    /// Resolves `has-avatar.test` to a fixed image and everything else to nothing.
    #[derive(Default)]
    struct StubResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Resolve for StubResolver {
        async fn resolve(&self, domain: &Domain) -> ResolvedUrl {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if domain.as_str() == "has-avatar.test" {
                ResolvedUrl::found("http://has-avatar.test/apple.png")
            } else {
                ResolvedUrl::not_found()
            }
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &EntryKey) -> Result<Option<CacheEntry>, Error> {
            Err(Error::CorruptEntry("disk on fire".into()))
        }

        async fn put(&self, _key: &EntryKey, _url: &ResolvedUrl) -> Result<(), Error> {
            Err(Error::CorruptEntry("disk on fire".into()))
        }

        async fn remove(&self, _key: &EntryKey) -> Result<(), Error> {
            Ok(())
        }

        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    fn app_with(store: Arc<dyn CacheStore>, resolver: Arc<StubResolver>, config: &AppConfig) -> Router {
        let cache = AvatarCache::new(store, resolver, Duration::from_secs(60));
        build_router(AppState::new(cache, config).unwrap())
    }

    fn app() -> (Router, Arc<StubResolver>) {
        let resolver = Arc::new(StubResolver::default());
        let app = app_with(Arc::new(MemoryStore::new()), resolver.clone(), &AppConfig::default());
        (app, resolver)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_found_avatar_redirects_to_image() {
        let (app, _) = app();
        let response = get(app, "/avatar/has-avatar.test/").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "http://has-avatar.test/apple.png");
    }

    #[tokio::test]
    async fn test_missing_avatar_uses_fallback_defaults() {
        let (app, _) = app();
        let response = get(app, "/avatar/noimages.test/").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "http://gravatar.com/avatar/?s=21&f=d&d=mm");
    }

    #[tokio::test]
    async fn test_size_and_default() {
        let (app, _) = app();
        let response = get(app.clone(), "/avatar/noimages.test/60/").await;
        assert_eq!(location(&response), "http://gravatar.com/avatar/?s=60&f=d&d=mm");

        let response = get(app, "/avatar/noimages.test/40/wavatar/").await;
        assert_eq!(location(&response), "http://gravatar.com/avatar/?s=40&f=d&d=wavatar");
    }

    #[tokio::test]
    async fn test_davatar_jpg_variants() {
        let (app, _) = app();
        let response = get(app.clone(), "/avatar/noimages.test/davatar.jpg").await;
        assert_eq!(location(&response), "http://gravatar.com/avatar/?s=21&f=d&d=mm");

        let response = get(app.clone(), "/avatar/noimages.test/40/davatar.jpg").await;
        assert_eq!(location(&response), "http://gravatar.com/avatar/?s=40&f=d&d=mm");

        let response = get(app.clone(), "/avatar/noimages.test/40/wavatar/davatar.jpg").await;
        assert_eq!(location(&response), "http://gravatar.com/avatar/?s=40&f=d&d=wavatar");

        let response = get(app, "/avatar/has-avatar.test/davatar.jpg").await;
        assert_eq!(location(&response), "http://has-avatar.test/apple.png");
    }

    #[tokio::test]
    async fn test_non_numeric_size_not_found() {
        let (app, resolver) = app();
        let response = get(app, "/avatar/noimages.test/big/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_trailing_slash_not_found() {
        let (app, _) = app();
        let response = get(app, "/avatar/noimages.test").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_domain_bad_request() {
        let (app, resolver) = app();
        let response = get(app, "/avatar/bad..domain/").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeat_requests_hit_cache() {
        let (app, resolver) = app();
        get(app.clone(), "/avatar/has-avatar.test/").await;
        get(app.clone(), "/avatar/HAS-AVATAR.test/60/").await;
        let response = get(app, "/avatar/has-avatar.test/davatar.jpg").await;

        assert_eq!(location(&response), "http://has-avatar.test/apple.png");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_storage_fault_degrades() {
        let resolver = Arc::new(StubResolver::default());
        let app = app_with(Arc::new(BrokenStore), resolver.clone(), &AppConfig::default());

        let response = get(app, "/avatar/has-avatar.test/").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "http://has-avatar.test/apple.png");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_index_not_found_by_default() {
        let (app, _) = app();
        let response = get(app, "/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_index_redirect() {
        let config = AppConfig { index_redirect: Some("https://example.test/davatar".into()), ..AppConfig::default() };
        let app = app_with(Arc::new(MemoryStore::new()), Arc::new(StubResolver::default()), &config);

        let response = get(app, "/").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "https://example.test/davatar");
    }
}
