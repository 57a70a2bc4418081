//! In-memory metadata cache (TTL + LRU)
//!
//! Entries expire `ttl` after insertion. Expired entries are dropped lazily
//! when read and in bulk by [`MetadataCache::sweep`]; the entry count is
//! bounded by LRU eviction.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crumble_addons::MetaItem;

use crate::config::CacheConfig;

/// Cached payload: a catalog listing or a single meta item
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Items(Vec<MetaItem>),
    Item(MetaItem),
}

/// One cache entry with the id of the addon that produced it
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: CachedData,
    pub inserted_at: Instant,
    pub source: String,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Bounded TTL cache for catalog and meta responses
pub struct MetadataCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MetadataCache {
    /// Create a cache holding at most `max_entries` entries (at least one)
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        let expired = entries.get(key)?.is_expired(self.ttl, Instant::now());
        if expired {
            entries.pop(key);
            tracing::debug!(key = %key, "Cache entry expired");
            return None;
        }
        entries.get(key).cloned()
    }

    /// Catalog listing stored under `key`
    pub fn get_items(&self, key: &str) -> Option<Vec<MetaItem>> {
        match self.get(key)?.data {
            CachedData::Items(items) => Some(items),
            CachedData::Item(_) => None,
        }
    }

    /// Meta item stored under `key`
    pub fn get_item(&self, key: &str) -> Option<MetaItem> {
        match self.get(key)?.data {
            CachedData::Item(item) => Some(item),
            CachedData::Items(_) => None,
        }
    }

    /// Insert or replace an entry, evicting the least recently used one when full
    pub fn insert(&self, key: impl Into<String>, data: CachedData, source: impl Into<String>) {
        let entry = CacheEntry {
            data,
            inserted_at: Instant::now(),
            source: source.into(),
        };
        let key = key.into();
        if let Some((evicted, _)) = self.entries.lock().push(key.clone(), entry) {
            if evicted != key {
                tracing::debug!(key = %evicted, "Cache entry evicted (capacity)");
            }
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock();
        let keys: Vec<String> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            entries.pop(key);
        }
        keys.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(self.ttl, now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep expired entries every `interval` until `cancel` fires
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::debug!("Cache sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> MetaItem {
        MetaItem {
            id: id.to_string(),
            name: id.to_uppercase(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MetadataCache::new(Duration::from_secs(60), 16);
        cache.insert("meta:movie:a", CachedData::Item(item("a")), "addon.a");

        tokio::time::advance(Duration::from_secs(59)).await;
        let entry = cache.get("meta:movie:a").unwrap();
        assert_eq!(entry.source, "addon.a");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("meta:movie:a").is_none());
        assert!(cache.is_empty(), "expired entry should be removed on read");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = MetadataCache::new(Duration::from_secs(10), 16);
        cache.insert("old", CachedData::Items(vec![item("a")]), "s");
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert("new", CachedData::Items(vec![item("b")]), "s");
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_items("new").is_some());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = MetadataCache::new(Duration::from_secs(60), 2);
        cache.insert("a", CachedData::Item(item("a")), "s");
        cache.insert("b", CachedData::Item(item("b")), "s");
        // Touch "a" so "b" becomes least recently used
        assert!(cache.get("a").is_some());
        cache.insert("c", CachedData::Item(item("c")), "s");

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_typed_getters() {
        let cache = MetadataCache::new(Duration::from_secs(60), 8);
        cache.insert("catalog:movie:top", CachedData::Items(vec![item("a")]), "s");
        cache.insert("meta:movie:a", CachedData::Item(item("a")), "s");

        assert_eq!(cache.get_items("catalog:movie:top").unwrap().len(), 1);
        assert!(cache.get_item("catalog:movie:top").is_none());
        assert_eq!(cache.get_item("meta:movie:a").unwrap().id, "a");
    }

    #[test]
    fn test_invalidate() {
        let cache = MetadataCache::new(Duration::from_secs(60), 8);
        cache.insert("catalog:movie:top", CachedData::Items(vec![]), "s");
        cache.insert("catalog:movie:top:Action", CachedData::Items(vec![]), "s");
        cache.insert("meta:movie:a", CachedData::Item(item("a")), "s");

        assert!(cache.invalidate("meta:movie:a"));
        assert!(!cache.invalidate("meta:movie:a"));
        assert_eq!(cache.invalidate_prefix("catalog:movie:"), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = MetadataCache::new(Duration::from_secs(60), 0);
        cache.insert("a", CachedData::Item(item("a")), "s");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_until_cancelled() {
        let cache = Arc::new(MetadataCache::new(Duration::from_secs(5), 8));
        cache.insert("a", CachedData::Item(item("a")), "s");

        let cancel = CancellationToken::new();
        let handle = cache.spawn_sweeper(Duration::from_secs(10), cancel.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
