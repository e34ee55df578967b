//! In-memory cache store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheEntry, CacheStore, EntryKey};
use crate::{Error, ResolvedUrl};

/// Process-local [`CacheStore`] backed by a `HashMap` behind a tokio `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Store an entry with an explicit write time.
    pub async fn put_at(&self, key: &EntryKey, url: &ResolvedUrl, written_at: SystemTime) {
        let mut entries = self.entries.write().await;
        entries.insert(key.domain().to_string(), CacheEntry { url: url.clone(), written_at });
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &EntryKey) -> Result<Option<CacheEntry>, Error> {
        let entries = self.entries.read().await;
        Ok(entries.get(key.domain()).cloned())
    }

    async fn put(&self, key: &EntryKey, url: &ResolvedUrl) -> Result<(), Error> {
        self.put_at(key, url, SystemTime::now()).await;
        Ok(())
    }

    async fn remove(&self, key: &EntryKey) -> Result<(), Error> {
        self.entries.write().await.remove(key.domain());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
