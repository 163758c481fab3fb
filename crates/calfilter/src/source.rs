//! Per-URL cache of raw source calendars

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use calfilter_core::{
    CacheMetrics, CacheOperation, CacheStats, CacheTier, CalendarError, FetchOutcome, Fetcher,
    NoopMetrics, Result, SourceCacheEntry,
};
use calfilter_http::HttpFetcher;
use calfilter_storage::KeyedStore;

/// Configuration for SourceCalendarCache
#[derive(Debug, Clone)]
pub struct SourceCacheConfig {
    /// TTL used when the caller does not pass one
    pub default_ttl: Duration,
}

impl Default for SourceCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
        }
    }
}

impl SourceCacheConfig {
    /// Create config with specific default TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { default_ttl: ttl }
    }
}

#[derive(Debug, Default)]
struct SourceStats {
    hits: u64,
    misses: u64,
    stale_hits: u64,
    fetches: u64,
    not_modified: u64,
    fetch_failures: u64,
}

/// Raw calendar text per source URL, revalidated with conditional GETs
///
/// Requests for the same URL are serialized, so at most one fetch per URL
/// is in flight. Once a URL has content it never loses it to a failed
/// fetch; failures serve the last good copy until the next attempt.
///
/// Cloning creates a new handle to the SAME underlying cache.
pub struct SourceCalendarCache<F = HttpFetcher, M = NoopMetrics>
where
    F: Fetcher,
    M: CacheMetrics,
{
    fetcher: Arc<F>,
    metrics: Arc<M>,
    entries: KeyedStore<SourceCacheEntry>,
    stats: Arc<RwLock<SourceStats>>,
    config: SourceCacheConfig,
}

impl<F: Fetcher> SourceCalendarCache<F, NoopMetrics> {
    /// Create a cache with default config and no metrics
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, SourceCacheConfig::default())
    }

    /// Create with custom config
    pub fn with_config(fetcher: F, config: SourceCacheConfig) -> Self {
        Self::with_metrics(fetcher, NoopMetrics, config)
    }
}

impl<F, M> SourceCalendarCache<F, M>
where
    F: Fetcher,
    M: CacheMetrics,
{
    /// Create a cache reporting to `metrics`
    pub fn with_metrics(fetcher: F, metrics: M, config: SourceCacheConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            metrics: Arc::new(metrics),
            entries: KeyedStore::new(),
            stats: Arc::new(RwLock::new(SourceStats::default())),
            config,
        }
    }

    pub fn config(&self) -> &SourceCacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<M> {
        &self.metrics
    }

    /// Get the source text for `url`
    ///
    /// Content younger than `ttl` is returned without touching the network.
    /// Otherwise a conditional fetch decides:
    /// - `200` with a body replaces the content and validator
    /// - `304` keeps the content and restarts the TTL
    /// - any failure keeps the content, restarts the TTL and serves it
    ///
    /// Fails with [`CalendarError::NoContentAvailable`] only when the fetch
    /// failed and nothing was ever cached for `url`.
    pub async fn get_content(&self, url: &str, ttl: Duration) -> Result<Arc<str>> {
        self.load(url, Some(ttl)).await
    }

    /// [`get_content`](Self::get_content) with the configured default TTL
    pub async fn content(&self, url: &str) -> Result<Arc<str>> {
        self.load(url, Some(self.config.default_ttl)).await
    }

    /// Revalidate `url` upstream regardless of age
    ///
    /// Still conditional: an unchanged source costs a `304`.
    pub async fn revalidate(&self, url: &str) -> Result<Arc<str>> {
        self.load(url, None).await
    }

    async fn load(&self, url: &str, ttl: Option<Duration>) -> Result<Arc<str>> {
        let effective_ttl = ttl.unwrap_or(self.config.default_ttl);
        let mut entry = self
            .entries
            .lock(url, || SourceCacheEntry::new(url, effective_ttl))
            .await;
        entry.ttl = effective_ttl;

        if let Some(ttl) = ttl {
            if entry.is_fresh(ttl) {
                if let Some(content) = entry.content.clone() {
                    self.stats.write().hits += 1;
                    self.metrics.record_hit(url, CacheTier::Source);
                    return Ok(content);
                }
            }
        }

        self.stats.write().misses += 1;
        self.metrics.record_miss(url, CacheTier::Source);

        let start = Instant::now();
        let outcome = self.fetcher.fetch(url, &entry.validator).await;
        self.metrics
            .record_latency(CacheOperation::Fetch, start.elapsed());
        self.metrics.record_fetch(url, outcome.status());
        self.stats.write().fetches += 1;

        match outcome {
            FetchOutcome::Fresh { content, validator } if !content.is_empty() => {
                debug!(url, bytes = content.len(), "source calendar updated");
                let content: Arc<str> = Arc::from(content);
                entry.store(content.clone(), validator);
                Ok(content)
            }
            FetchOutcome::Fresh { .. } => self.fall_back(&mut entry, "empty response body".into()),
            FetchOutcome::NotModified => match entry.content.clone() {
                Some(content) => {
                    debug!(url, "source calendar not modified");
                    self.stats.write().not_modified += 1;
                    entry.touch();
                    Ok(content)
                }
                None => self.fall_back(&mut entry, "304 without cached content".into()),
            },
            FetchOutcome::Failed { reason } => self.fall_back(&mut entry, reason),
        }
    }

    fn fall_back(&self, entry: &mut SourceCacheEntry, reason: String) -> Result<Arc<str>> {
        self.stats.write().fetch_failures += 1;
        match entry.content.clone() {
            Some(content) => {
                warn!(url = %entry.url, %reason, "source fetch failed, serving cached copy");
                self.stats.write().stale_hits += 1;
                self.metrics.record_stale_hit(&entry.url);
                entry.touch();
                Ok(content)
            }
            None => {
                warn!(url = %entry.url, %reason, "source fetch failed with nothing cached");
                Err(CalendarError::NoContentAvailable {
                    url: entry.url.clone(),
                    reason,
                })
            }
        }
    }

    /// Copy of the entry for `url`
    pub async fn entry(&self, url: &str) -> Option<SourceCacheEntry> {
        self.entries.snapshot(url).await
    }

    /// Drop the cached copy of `url`
    ///
    /// Waits for an in-flight fetch of `url` to finish first. Filtered
    /// outputs built from it stay cached; the next request for any of them
    /// refetches the source.
    pub async fn remove(&self, url: &str) -> bool {
        self.entries.remove(url).await
    }

    /// Every URL with an entry
    pub fn urls(&self) -> Vec<String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let stats = self.stats.read();
        CacheStats {
            hits: stats.hits,
            misses: stats.misses,
            stale_hits: stats.stale_hits,
            fetches: stats.fetches,
            not_modified: stats.not_modified,
            fetch_failures: stats.fetch_failures,
            recomputes: 0,
            size: self.entries.len(),
        }
    }
}

impl<F, M> Clone for SourceCalendarCache<F, M>
where
    F: Fetcher,
    M: CacheMetrics,
{
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            metrics: self.metrics.clone(),
            entries: self.entries.clone(),
            stats: self.stats.clone(),
            config: self.config.clone(),
        }
    }
}
