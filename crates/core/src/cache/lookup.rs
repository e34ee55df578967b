//! Cache lookups with expiry and refresh.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::{CacheStore, EntryKey};
use crate::{Domain, Error, Resolve, ResolvedUrl};

/// Resolved-avatar cache.
///
/// Serves stored results while they are younger than the TTL and otherwise
/// calls the resolver and persists what it returns. A cached "not found" is
/// honored for the full TTL like any other result.
///
/// Concurrent misses for the same domain may each call the resolver; the
/// last write wins.
#[derive(Clone)]
pub struct AvatarCache {
    store: Arc<dyn CacheStore>,
    resolver: Arc<dyn Resolve>,
    ttl: Duration,
}

impl AvatarCache {
    pub fn new(store: Arc<dyn CacheStore>, resolver: Arc<dyn Resolve>, ttl: Duration) -> Self {
        Self { store, resolver, ttl }
    }

    /// Look up `domain`, resolving and persisting on a miss or an expired entry.
    ///
    /// # Errors
    ///
    /// Any storage failure is returned as-is, even when a resolution already
    /// happened. Use [`AvatarCache::get_avatar_url`] to degrade instead.
    pub async fn lookup(&self, domain: &Domain) -> Result<ResolvedUrl, Error> {
        self.lookup_inner(domain, false).await
    }

    /// Like [`AvatarCache::lookup`], but a storage fault degrades to an
    /// uncached resolution instead of failing.
    ///
    /// # Errors
    ///
    /// Only errors that are not storage faults are returned.
    pub async fn get_avatar_url(&self, domain: &Domain) -> Result<ResolvedUrl, Error> {
        self.lookup_inner(domain, true).await
    }

    async fn lookup_inner(&self, domain: &Domain, degrade: bool) -> Result<ResolvedUrl, Error> {
        let key = EntryKey::for_domain(domain);
        let backend = self.store.backend();

        let cached = match self.store.get(&key).await {
            Ok(cached) => cached,
            Err(e) if degrade && e.is_storage_fault() => {
                tracing::warn!(%domain, backend, error = %e, "cache read failed, resolving without cache");
                return Ok(self.resolver.resolve(domain).await);
            }
            Err(e) => return Err(e),
        };

        match cached {
            Some(entry) if !entry.is_expired(self.ttl, SystemTime::now()) => {
                tracing::debug!(%domain, backend, found = entry.url.is_found(), "cache hit");
                return Ok(entry.url);
            }
            Some(entry) => {
                tracing::debug!(%domain, backend, age_secs = entry.age(SystemTime::now()).as_secs(), "cache entry expired");
                // The stale generation goes before the new one is written.
                match self.store.remove(&key).await {
                    Ok(()) => {}
                    Err(e) if degrade && e.is_storage_fault() => {
                        tracing::warn!(%domain, backend, error = %e, "cache delete failed, serving uncached result");
                        return Ok(self.resolver.resolve(domain).await);
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                tracing::debug!(%domain, backend, "cache miss");
            }
        }

        let resolved = self.resolver.resolve(domain).await;

        match self.store.put(&key, &resolved).await {
            Ok(()) => Ok(resolved),
            Err(e) if degrade && e.is_storage_fault() => {
                tracing::warn!(%domain, backend, error = %e, "cache write failed, serving uncached result");
                Ok(resolved)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for AvatarCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarCache")
            .field("backend", &self.store.backend())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, FsStore, MemoryStore, SqliteStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(172_800);

    /// Returns `responses[n]` on the n-th call (the last one once exhausted).
    struct CountingResolver {
        calls: AtomicUsize,
        responses: Vec<ResolvedUrl>,
    }

    impl CountingResolver {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                responses: responses.iter().map(|r| ResolvedUrl::from_stored(r)).collect(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Resolve for CountingResolver {
        async fn resolve(&self, _domain: &Domain) -> ResolvedUrl {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses[n.min(self.responses.len() - 1)].clone()
        }
    }

    /// Hands out a different long URL on every call and remembers each one.
    #[derive(Default)]
    struct DistinctResolver {
        issued: Mutex<Vec<ResolvedUrl>>,
    }

    impl DistinctResolver {
        fn issued(&self) -> Vec<ResolvedUrl> {
            self.issued.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Resolve for DistinctResolver {
        async fn resolve(&self, domain: &Domain) -> ResolvedUrl {
            let url = {
                let mut issued = self.issued.lock().unwrap();
                let url = ResolvedUrl::found(format!("http://{domain}/{}/{}.png", issued.len(), "a".repeat(8192)));
                issued.push(url.clone());
                url
            };
            tokio::task::yield_now().await;
            url
        }
    }

    async fn lookup_concurrently(cache: &AvatarCache, name: &str, n: usize) -> Vec<ResolvedUrl> {
        let tasks: Vec<_> = (0..n)
            .map(|_| {
                let cache = cache.clone();
                let domain = domain(name);
                tokio::spawn(async move { cache.lookup(&domain).await.unwrap() })
            })
            .collect();

        let mut results = Vec::with_capacity(n);
        for task in tasks {
            results.push(task.await.unwrap());
        }
        results
    }

    /// Store whose operations fail on demand.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        fail_get: bool,
        fail_put: bool,
        fail_remove: bool,
    }

    fn fault(action: &'static str) -> Error {
        Error::io(action, "/unwritable", std::io::Error::from(std::io::ErrorKind::PermissionDenied))
    }

    #[async_trait]
    impl CacheStore for FaultyStore {
        async fn get(&self, key: &EntryKey) -> Result<Option<CacheEntry>, Error> {
            if self.fail_get { Err(fault("read")) } else { self.inner.get(key).await }
        }

        async fn put(&self, key: &EntryKey, url: &ResolvedUrl) -> Result<(), Error> {
            if self.fail_put { Err(fault("write")) } else { self.inner.put(key, url).await }
        }

        async fn remove(&self, key: &EntryKey) -> Result<(), Error> {
            if self.fail_remove { Err(fault("remove")) } else { self.inner.remove(key).await }
        }

        fn backend(&self) -> &'static str {
            "faulty"
        }
    }

    fn domain(name: &str) -> Domain {
        Domain::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_miss_resolves_and_persists() {
        let store = MemoryStore::new();
        let resolver = CountingResolver::new(&["http://example.test/img/share.png"]);
        let cache = AvatarCache::new(Arc::new(store.clone()), resolver.clone(), TTL);

        let result = cache.lookup(&domain("example.test")).await.unwrap();

        assert_eq!(result.as_str(), "http://example.test/img/share.png");
        assert_eq!(resolver.calls(), 1);
        let key = EntryKey::for_domain(&domain("example.test"));
        assert_eq!(store.get(&key).await.unwrap().unwrap().url, result);
    }

    #[tokio::test]
    async fn test_hit_within_ttl_resolves_once() {
        let resolver = CountingResolver::new(&["http://example.test/a.png", "http://example.test/b.png"]);
        let cache = AvatarCache::new(Arc::new(MemoryStore::new()), resolver.clone(), TTL);

        let first = cache.lookup(&domain("example.test")).await.unwrap();
        let second = cache.lookup(&domain("example.test")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_not_found_is_honored() {
        let resolver = CountingResolver::new(&["", "http://noimages.test/favicon.ico"]);
        let cache = AvatarCache::new(Arc::new(MemoryStore::new()), resolver.clone(), TTL);

        assert!(!cache.lookup(&domain("noimages.test")).await.unwrap().is_found());
        assert!(!cache.lookup(&domain("noimages.test")).await.unwrap().is_found());
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_replaced() {
        let store = MemoryStore::new();
        let key = EntryKey::for_domain(&domain("example.test"));
        let stale = SystemTime::now() - TTL - Duration::from_secs(1);
        store.put_at(&key, &ResolvedUrl::found("http://example.test/old.png"), stale).await;

        let resolver = CountingResolver::new(&["http://example.test/new.png"]);
        let cache = AvatarCache::new(Arc::new(store.clone()), resolver.clone(), TTL);

        let result = cache.lookup(&domain("example.test")).await.unwrap();

        assert_eq!(result.as_str(), "http://example.test/new.png");
        assert_eq!(resolver.calls(), 1);
        let entry = store.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.url.as_str(), "http://example.test/new.png");
        assert!(!entry.is_expired(TTL, SystemTime::now()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_entry_just_under_ttl_is_fresh() {
        let store = MemoryStore::new();
        let key = EntryKey::for_domain(&domain("example.test"));
        let almost = SystemTime::now() - TTL + Duration::from_secs(5);
        store.put_at(&key, &ResolvedUrl::found("http://example.test/old.png"), almost).await;

        let resolver = CountingResolver::new(&["http://example.test/new.png"]);
        let cache = AvatarCache::new(Arc::new(store), resolver.clone(), TTL);

        let result = cache.lookup(&domain("example.test")).await.unwrap();
        assert_eq!(result.as_str(), "http://example.test/old.png");
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_domains_are_independent() {
        let store = MemoryStore::new();
        let resolver = CountingResolver::new(&["http://x.test/favicon.ico"]);
        let cache = AvatarCache::new(Arc::new(store.clone()), resolver.clone(), TTL);

        cache.lookup(&domain("a.test")).await.unwrap();
        cache.lookup(&domain("b.test")).await.unwrap();
        cache.lookup(&domain("A.test")).await.unwrap();

        assert_eq!(resolver.calls(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_read_fault_propagates_from_lookup() {
        let store = FaultyStore { fail_get: true, ..Default::default() };
        let resolver = CountingResolver::new(&["http://example.test/a.png"]);
        let cache = AvatarCache::new(Arc::new(store), resolver.clone(), TTL);

        let err = cache.lookup(&domain("example.test")).await.unwrap_err();
        assert!(err.is_storage_fault());
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_read_fault_degrades_in_get_avatar_url() {
        let store = FaultyStore { fail_get: true, ..Default::default() };
        let resolver = CountingResolver::new(&["http://example.test/a.png"]);
        let cache = AvatarCache::new(Arc::new(store), resolver.clone(), TTL);

        let result = cache.get_avatar_url(&domain("example.test")).await.unwrap();
        assert_eq!(result.as_str(), "http://example.test/a.png");
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_write_fault_keeps_resolved_value_when_degrading() {
        let store = FaultyStore { fail_put: true, ..Default::default() };
        let resolver = CountingResolver::new(&["http://example.test/a.png"]);
        let cache = AvatarCache::new(Arc::new(store), resolver.clone(), TTL);

        let strict = cache.lookup(&domain("example.test")).await;
        assert!(matches!(strict, Err(Error::Io { action: "write", .. })));

        let degraded = cache.get_avatar_url(&domain("example.test")).await.unwrap();
        assert_eq!(degraded.as_str(), "http://example.test/a.png");
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_remove_fault_skips_persistence_when_degrading() {
        let store = FaultyStore { fail_remove: true, ..Default::default() };
        let key = EntryKey::for_domain(&domain("example.test"));
        let stale = SystemTime::now() - TTL - Duration::from_secs(1);
        store.inner.put_at(&key, &ResolvedUrl::found("http://example.test/old.png"), stale).await;
        let inner = store.inner.clone();

        let resolver = CountingResolver::new(&["http://example.test/new.png"]);
        let cache = AvatarCache::new(Arc::new(store), resolver.clone(), TTL);

        let result = cache.get_avatar_url(&domain("example.test")).await.unwrap();
        assert_eq!(result.as_str(), "http://example.test/new.png");

        let entry = inner.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.url.as_str(), "http://example.test/old.png");
    }

    #[tokio::test]
    async fn test_fs_store_expiry_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let resolver = CountingResolver::new(&["http://example.test/a.png", "http://example.test/b.png"]);
        let cache = AvatarCache::new(Arc::new(store.clone()), resolver.clone(), TTL);

        assert_eq!(cache.lookup(&domain("example.test")).await.unwrap().as_str(), "http://example.test/a.png");

        let path = store.entry_path(&EntryKey::for_domain(&domain("example.test")));
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - TTL - Duration::from_secs(60)).unwrap();
        drop(file);

        assert_eq!(cache.lookup(&domain("example.test")).await.unwrap().as_str(), "http://example.test/b.png");
        assert_eq!(resolver.calls(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "http://example.test/b.png");
    }

    #[tokio::test]
    async fn test_sqlite_store_expiry() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let key = EntryKey::for_domain(&domain("example.test"));
        store
            .put_at(&key, &ResolvedUrl::not_found(), SystemTime::now() - TTL - Duration::from_secs(1))
            .await
            .unwrap();

        let resolver = CountingResolver::new(&["http://example.test/favicon.ico"]);
        let cache = AvatarCache::new(Arc::new(store.clone()), resolver.clone(), TTL);

        let first = cache.lookup(&domain("example.test")).await.unwrap();
        let second = cache.lookup(&domain("example.test")).await.unwrap();

        assert_eq!(first.as_str(), "http://example.test/favicon.ico");
        assert_eq!(first, second);
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_fs_store_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let resolver = Arc::new(DistinctResolver::default());
        let cache = AvatarCache::new(Arc::new(store.clone()), resolver.clone(), TTL);

        let results = lookup_concurrently(&cache, "race.test", 16).await;

        let issued = resolver.issued();
        assert!(!issued.is_empty());
        assert!(results.iter().all(|r| issued.contains(r)));

        let path = store.entry_path(&EntryKey::for_domain(&domain("race.test")));
        let stored = ResolvedUrl::from_stored(&std::fs::read_to_string(&path).unwrap());
        assert!(issued.contains(&stored));

        let shard: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(shard, vec![std::ffi::OsString::from("race.test")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_sqlite_store_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cache.db");
        let store = SqliteStore::open(&db_path).await.unwrap();
        let resolver = Arc::new(DistinctResolver::default());
        let cache = AvatarCache::new(Arc::new(store.clone()), resolver.clone(), TTL);

        let results = lookup_concurrently(&cache, "race.test", 16).await;

        let issued = resolver.issued();
        assert!(results.iter().all(|r| issued.contains(r)));

        let key = EntryKey::for_domain(&domain("race.test"));
        let stored = store.get(&key).await.unwrap().unwrap().url;
        assert!(issued.contains(&stored));

        let conn = tokio_rusqlite::rusqlite::Connection::open(&db_path).unwrap();
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM avatars", [], |row| row.get(0)).unwrap();
        assert_eq!(rows, 1);
    }
}
