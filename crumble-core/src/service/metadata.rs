//! Metadata Manager
//!
//! Aggregates catalog, meta, stream and subtitle requests across every
//! installed addon source.
//!
//! # Architecture
//! ```text
//! MetadataManager
//!   ├── sources (primary addon first for catalogs and primary ids)
//!   ├── RetryPolicy (per source request)
//!   ├── MetadataCache (catalog + meta results, TTL/LRU)
//!   └── fallback (sample catalog and stream, never cached)
//! ```
//!
//! A failing addon never fails the aggregate call: its error is logged and
//! it contributes nothing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crumble_addons::{AddonClientError, MetaItem, Stream, Subtitle};
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::key_builder::CATALOG_PREFIX;
use crate::cache::{catalog_key, meta_key, CachedData, MetadataCache};
use crate::resilience::RetryPolicy;
use crate::service::normalize::normalize_meta;
use crate::source::{fallback, is_primary_id, AddonSource};
use crate::{Config, Result};

/// Cache source tag for results merged from several addons
const MULTIPLE_SOURCES: &str = "multiple";

/// Aggregation service over the installed addon sources
pub struct MetadataManager {
    sources: RwLock<Vec<Arc<dyn AddonSource>>>,
    cache: Arc<MetadataCache>,
    retry: RetryPolicy,
    primary_prefix: String,
    fallback_enabled: bool,
    auth_required: AtomicBool,
    http: reqwest::Client,
}

impl std::fmt::Debug for MetadataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataManager")
            .field("sources", &self.sources.read().len())
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("primary_prefix", &self.primary_prefix)
            .field("fallback_enabled", &self.fallback_enabled)
            .finish_non_exhaustive()
    }
}

impl MetadataManager {
    pub fn new(
        sources: Vec<Arc<dyn AddonSource>>,
        cache: Arc<MetadataCache>,
        retry: RetryPolicy,
        primary_prefix: impl Into<String>,
    ) -> Self {
        Self {
            sources: RwLock::new(sources),
            cache,
            retry,
            primary_prefix: primary_prefix.into(),
            fallback_enabled: true,
            auth_required: AtomicBool::new(false),
            http: reqwest::Client::new(),
        }
    }

    /// Build a manager (with its own cache) from configuration
    pub fn from_config(config: &Config, sources: Vec<Arc<dyn AddonSource>>) -> Result<Self> {
        let http = crumble_addons::build_http_client(config.request_timeout())?;
        Ok(Self::new(
            sources,
            Arc::new(MetadataCache::from_config(&config.cache)),
            RetryPolicy::from(&config.retry),
            &config.addons.primary_prefix,
        )
        .with_fallback(config.addons.fallback_enabled)
        .with_http_client(http))
    }

    #[must_use]
    pub const fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// HTTP client used to download subtitle files
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    #[must_use]
    pub fn sources(&self) -> Vec<Arc<dyn AddonSource>> {
        self.sources.read().clone()
    }

    /// Replace the source list (after the registry reloads)
    pub fn update_sources(&self, sources: Vec<Arc<dyn AddonSource>>) {
        tracing::debug!(count = sources.len(), "Metadata sources updated");
        *self.sources.write() = sources;
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop expired cache entries. Returns how many were removed.
    pub fn clean_cache(&self) -> usize {
        self.cache.sweep()
    }

    /// Drop every cached catalog listing, keeping meta entries.
    /// Returns how many were removed.
    pub fn invalidate_catalogs(&self) -> usize {
        self.cache.invalidate_prefix(CATALOG_PREFIX)
    }

    /// Start the background task that drops expired cache entries every
    /// `interval`. It runs until `cancel` fires.
    pub fn start_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tracing::debug!(interval_secs = interval.as_secs(), "Starting cache sweeper");
        self.cache.spawn_sweeper(interval, cancel)
    }

    /// Whether an addon rejected the API key since the last successful primary response
    #[must_use]
    pub fn auth_required(&self) -> bool {
        self.auth_required.load(Ordering::Relaxed)
    }

    fn is_primary(&self, source: &dyn AddonSource) -> bool {
        is_primary_id(source.id(), &self.primary_prefix)
    }

    fn primary(&self, sources: &[Arc<dyn AddonSource>]) -> Option<Arc<dyn AddonSource>> {
        sources.iter().find(|s| self.is_primary(s.as_ref())).cloned()
    }

    /// Ids in the primary addon's namespace look like `tmdb:603`
    fn is_primary_content_id(&self, id: &str) -> bool {
        !self.primary_prefix.is_empty()
            && id
                .strip_prefix(self.primary_prefix.as_str())
                .is_some_and(|rest| rest.starts_with(':'))
    }

    /// Log a per-source failure and remember authorization problems
    fn record_failure(&self, source: &dyn AddonSource, resource: &str, err: &AddonClientError) {
        if err.is_unauthorized() {
            self.auth_required.store(true, Ordering::Relaxed);
        }
        tracing::warn!(
            addon = %source.id(),
            resource,
            error = %err,
            "Addon request failed"
        );
    }

    fn record_success(&self, source: &dyn AddonSource) {
        if self.is_primary(source) {
            self.auth_required.store(false, Ordering::Relaxed);
        }
    }

    /// Catalog listing for `content_type`.
    ///
    /// The primary addon wins when it returns anything; otherwise the other
    /// addons advertising the type are merged in addon order and deduplicated
    /// by id. An empty merge falls back to the sample catalog (not cached).
    pub async fn get_catalog(
        &self,
        content_type: &str,
        catalog_id: &str,
        genre: Option<&str>,
    ) -> Vec<MetaItem> {
        let key = catalog_key(content_type, catalog_id, genre);
        if let Some(items) = self.cache.get_items(&key) {
            tracing::debug!(key = %key, "Catalog cache hit");
            return items;
        }
        tracing::debug!(key = %key, "Catalog cache miss");

        let sources = self.sources();

        if let Some(primary) = self.primary(&sources) {
            match self
                .retry
                .retry(|| primary.catalog(content_type, catalog_id, genre))
                .await
            {
                Ok(items) => {
                    self.record_success(primary.as_ref());
                    if !items.is_empty() {
                        let items = dedup_by_id(items.into_iter().map(normalize_meta));
                        self.cache
                            .insert(key, CachedData::Items(items.clone()), primary.id());
                        return items;
                    }
                }
                Err(e) => self.record_failure(primary.as_ref(), "catalog", &e),
            }
        }

        let others: Vec<&Arc<dyn AddonSource>> = sources
            .iter()
            .filter(|s| !self.is_primary(s.as_ref()) && s.has_type(content_type))
            .collect();
        let results = join_all(others.iter().map(|source| {
            self.retry
                .retry(move || source.catalog(content_type, catalog_id, genre))
        }))
        .await;

        let mut contributors = Vec::new();
        let mut merged = Vec::new();
        for (source, result) in others.iter().zip(results) {
            match result {
                Ok(items) => {
                    if !items.is_empty() {
                        contributors.push(source.id().to_string());
                    }
                    merged.extend(items);
                }
                Err(e) => self.record_failure(source.as_ref(), "catalog", &e),
            }
        }

        let merged = dedup_by_id(merged.into_iter().map(normalize_meta));
        if !merged.is_empty() {
            let source = match contributors.as_slice() {
                [single] => single.clone(),
                _ => MULTIPLE_SOURCES.to_string(),
            };
            self.cache
                .insert(key, CachedData::Items(merged.clone()), source);
            return merged;
        }

        if self.fallback_enabled {
            tracing::debug!(content_type, "No addon catalog results, serving fallback");
            return dedup_by_id(fallback::catalog(content_type).into_iter().map(normalize_meta));
        }
        Vec::new()
    }

    /// Metadata for one item. Only `movie` and `series` are accepted.
    ///
    /// Primary ids (`tmdb:...`) go to the primary addon first. The first
    /// addon returning a meta wins; the sample catalog is the last resort.
    pub async fn get_meta(&self, content_type: &str, id: &str) -> Option<MetaItem> {
        if !matches!(content_type, "movie" | "series") {
            tracing::warn!(content_type, "Invalid meta type, expected 'movie' or 'series'");
            return None;
        }

        let key = meta_key(content_type, id);
        if let Some(item) = self.cache.get_item(&key) {
            tracing::debug!(key = %key, "Meta cache hit");
            return Some(item);
        }
        tracing::debug!(key = %key, "Meta cache miss");

        let sources = self.sources();
        let mut candidates: Vec<Arc<dyn AddonSource>> = if self.is_primary_content_id(id) {
            self.primary(&sources).into_iter().collect()
        } else {
            Vec::new()
        };
        for source in sources.iter().filter(|s| s.has_type(content_type)) {
            if !candidates.iter().any(|c| Arc::ptr_eq(c, source)) {
                candidates.push(Arc::clone(source));
            }
        }

        for source in &candidates {
            match self.retry.retry(|| source.meta(content_type, id)).await {
                Ok(Some(meta)) => {
                    self.record_success(source.as_ref());
                    let meta = normalize_meta(meta);
                    self.cache
                        .insert(key, CachedData::Item(meta.clone()), source.id());
                    return Some(meta);
                }
                Ok(None) => self.record_success(source.as_ref()),
                Err(e) => self.record_failure(source.as_ref(), "meta", &e),
            }
        }

        if self.fallback_enabled {
            return fallback::find(id).map(normalize_meta);
        }
        None
    }

    /// Streams from every addon serving `stream` for the type, in addon order.
    /// With none, the sample stream is returned.
    pub async fn get_streams(&self, content_type: &str, id: &str) -> Vec<Stream> {
        let sources = self.sources();
        let serving: Vec<&Arc<dyn AddonSource>> = sources
            .iter()
            .filter(|s| s.supports("stream", content_type))
            .collect();

        let results = join_all(
            serving
                .iter()
                .map(|source| self.retry.retry(move || source.streams(content_type, id))),
        )
        .await;

        let mut streams = Vec::new();
        for (source, result) in serving.iter().zip(results) {
            match result {
                Ok(found) => {
                    self.record_success(source.as_ref());
                    streams.extend(found);
                }
                Err(e) => self.record_failure(source.as_ref(), "stream", &e),
            }
        }

        if streams.is_empty() && self.fallback_enabled {
            streams.push(fallback::sample_stream());
        }
        streams
    }

    /// Subtitle tracks from every addon serving `subtitles`. No fallback.
    pub async fn get_subtitles(
        &self,
        content_type: &str,
        id: &str,
        video_id: Option<&str>,
    ) -> Vec<Subtitle> {
        let sources = self.sources();
        let serving: Vec<&Arc<dyn AddonSource>> = sources
            .iter()
            .filter(|s| s.supports("subtitles", content_type))
            .collect();

        let results = join_all(serving.iter().map(|source| {
            self.retry
                .retry(move || source.subtitles(content_type, id, video_id))
        }))
        .await;

        let mut subtitles = Vec::new();
        for (source, result) in serving.iter().zip(results) {
            match result {
                Ok(found) => subtitles.extend(found),
                Err(e) => self.record_failure(source.as_ref(), "subtitles", &e),
            }
        }
        subtitles
    }

    /// Download the raw text of a subtitle track
    pub async fn load_subtitle_content(&self, subtitle: &Subtitle) -> Result<String> {
        let text = self
            .retry
            .retry(|| crumble_addons::fetch_text(&self.http, &subtitle.url))
            .await?;
        Ok(text)
    }
}

/// Keep the first item for each id, preserving order
fn dedup_by_id(items: impl IntoIterator<Item = MetaItem>) -> Vec<MetaItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str) -> MetaItem {
        MetaItem {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let out = dedup_by_id(vec![
            item("a", "first"),
            item("b", "b"),
            item("a", "second"),
            item("c", "c"),
            item("b", "again"),
        ]);
        let ids: Vec<_> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(out[0].name, "first");
    }

    #[test]
    fn test_primary_content_id() {
        let manager = MetadataManager::new(
            Vec::new(),
            Arc::new(MetadataCache::new(std::time::Duration::from_secs(60), 8)),
            RetryPolicy::no_retry(),
            "tmdb",
        );
        assert!(manager.is_primary_content_id("tmdb:603"));
        assert!(!manager.is_primary_content_id("tmdbx:603"));
        assert!(!manager.is_primary_content_id("tt0133093"));
    }
}
