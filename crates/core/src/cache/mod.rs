//! TTL cache of resolved avatar URLs.
//!
//! [`AvatarCache`] sits in front of a [`crate::Resolve`] implementation and
//! persists its results through a [`CacheStore`]. It supports:
//!
//! - Sharded keys (`ab/cd/<domain>`) derived from a SHA-256 of the domain
//! - A fixed freshness window; stale entries are deleted, then recomputed
//! - Three storage backends: sharded files, SQLite, and an in-memory map
//! - Degrading to uncached resolution when storage fails

pub mod connection;
pub mod entries;
pub mod fs;
pub mod hash;
pub mod lookup;
pub mod memory;
pub mod migrations;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

pub use crate::Error;
use crate::{AppConfig, CacheBackend, ResolvedUrl};

pub use connection::SqliteStore;
pub use fs::FsStore;
pub use hash::{EntryKey, domain_digest};
pub use lookup::AvatarCache;
pub use memory::MemoryStore;

/// A stored lookup result and the time it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: ResolvedUrl,
    pub written_at: SystemTime,
}

impl CacheEntry {
    /// Age of the entry at `now`. A timestamp in the future counts as zero.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.written_at).unwrap_or_default()
    }

    /// Whether the entry has outlived `ttl` at `now`.
    pub fn is_expired(&self, ttl: Duration, now: SystemTime) -> bool {
        self.age(now) > ttl
    }
}

/// Storage backend for cache entries.
///
/// Implementations hold at most one entry per key and must never expose a
/// partially written value. Every error they return is a storage fault.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the entry for `key`, if one exists.
    async fn get(&self, key: &EntryKey) -> Result<Option<CacheEntry>, Error>;

    /// Write `url` as the entry for `key`, replacing any previous one.
    async fn put(&self, key: &EntryKey, url: &ResolvedUrl) -> Result<(), Error>;

    /// Delete the entry for `key`. Deleting a missing entry is not an error.
    async fn remove(&self, key: &EntryKey) -> Result<(), Error>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Open the store selected by `config.cache_backend`.
///
/// The SQLite database is created and migrated if needed; the filesystem
/// root is created lazily on first write.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn CacheStore>, Error> {
    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Fs => Arc::new(FsStore::new(&config.cache_root)),
        CacheBackend::Sqlite => Arc::new(SqliteStore::open(&config.db_path).await?),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::debug!(backend = store.backend(), "opened cache store");
    Ok(store)
}
