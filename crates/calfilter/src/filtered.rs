//! Per-filter cache of generated calendars

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use calfilter_core::{
    CacheMetrics, CacheOperation, CacheStats, CacheTier, CalendarCodec, Fetcher, FilterId,
    FilterSpec, FilteredCacheEntry, NoopMetrics, Result,
};
use calfilter_http::HttpFetcher;
use calfilter_storage::KeyedStore;

use crate::codec::IcsCodec;
use crate::engine;
use crate::source::SourceCalendarCache;

/// Configuration for FilteredCalendarCache
#[derive(Debug, Clone, Default)]
pub struct FilteredCacheConfig {
    /// Source TTL applied on non-forced requests; `None` uses the source
    /// cache's default
    pub source_ttl: Option<Duration>,
}

impl FilteredCacheConfig {
    /// Create config with a specific source TTL
    pub fn with_source_ttl(ttl: Duration) -> Self {
        Self {
            source_ttl: Some(ttl),
        }
    }
}

#[derive(Debug, Default)]
struct FilteredStats {
    hits: u64,
    misses: u64,
    stale_hits: u64,
    recomputes: u64,
}

/// Filtered calendar text per filter, memoized on a fingerprint
///
/// An entry is reused while `fingerprint(source text, selected types)`
/// is unchanged, so an unchanged source never costs a parse. Requests for
/// the same filter are serialized; the filter lock is always taken before
/// the source lock.
///
/// Cloning creates a new handle to the SAME underlying cache.
pub struct FilteredCalendarCache<F = HttpFetcher, C = IcsCodec, M = NoopMetrics>
where
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    sources: SourceCalendarCache<F, M>,
    codec: Arc<C>,
    metrics: Arc<M>,
    entries: KeyedStore<Option<FilteredCacheEntry>>,
    stats: Arc<RwLock<FilteredStats>>,
    config: FilteredCacheConfig,
}

impl<F, C, M> FilteredCalendarCache<F, C, M>
where
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    /// Create a cache over `sources` with default config
    pub fn new(sources: SourceCalendarCache<F, M>, codec: C) -> Self {
        Self::with_config(sources, codec, FilteredCacheConfig::default())
    }

    /// Create with custom config
    pub fn with_config(
        sources: SourceCalendarCache<F, M>,
        codec: C,
        config: FilteredCacheConfig,
    ) -> Self {
        let metrics = sources.metrics().clone();
        Self {
            sources,
            codec: Arc::new(codec),
            metrics,
            entries: KeyedStore::new(),
            stats: Arc::new(RwLock::new(FilteredStats::default())),
            config,
        }
    }

    pub fn sources(&self) -> &SourceCalendarCache<F, M> {
        &self.sources
    }

    pub fn metrics(&self) -> &Arc<M> {
        &self.metrics
    }

    fn source_ttl(&self) -> Duration {
        self.config
            .source_ttl
            .unwrap_or(self.sources.config().default_ttl)
    }

    /// Get the filtered calendar for `spec`
    ///
    /// With `force_refresh` the source is revalidated upstream and the
    /// output regenerated even when the fingerprint matches. A source that
    /// fails to parse yields an empty calendar rather than an error.
    pub async fn get_filtered_content(
        &self,
        spec: &FilterSpec,
        force_refresh: bool,
    ) -> Result<Arc<str>> {
        let filter_id = spec.id().as_str();
        let mut current = self.entries.lock(filter_id, || None).await;

        let source = if force_refresh {
            self.sources.revalidate(spec.source_url()).await
        } else {
            self.sources
                .get_content(spec.source_url(), self.source_ttl())
                .await
        };
        let source = match (source, current.as_ref()) {
            (Ok(source), _) => source,
            (Err(err), Some(previous)) if err.is_unavailable() => {
                warn!(filter_id, error = %err, "source unavailable, serving previous output");
                self.stats.write().stale_hits += 1;
                self.metrics.record_stale_hit(filter_id);
                return Ok(previous.filtered_content.clone());
            }
            (Err(err), _) => return Err(err),
        };

        let fingerprint = engine::compute_fingerprint(&source, spec);
        if !force_refresh {
            if let Some(entry) = current.as_ref().filter(|e| e.matches(&fingerprint)) {
                self.stats.write().hits += 1;
                self.metrics.record_hit(filter_id, CacheTier::Filtered);
                return Ok(entry.filtered_content.clone());
            }
        }

        self.stats.write().misses += 1;
        self.metrics.record_miss(filter_id, CacheTier::Filtered);

        match self.generate(spec, &source) {
            Ok((content, event_count)) => {
                debug!(filter_id, event_count, %fingerprint, "filtered calendar generated");
                *current = Some(FilteredCacheEntry::new(
                    spec.id().clone(),
                    content.clone(),
                    fingerprint,
                    event_count,
                ));
                Ok(content)
            }
            Err(err) => match current.as_ref() {
                Some(previous) => {
                    warn!(filter_id, error = %err, "regeneration failed, serving previous output");
                    self.stats.write().stale_hits += 1;
                    Ok(previous.filtered_content.clone())
                }
                None => Err(err),
            },
        }
    }

    /// Non-forced [`get_filtered_content`](Self::get_filtered_content)
    pub async fn get(&self, spec: &FilterSpec) -> Result<Arc<str>> {
        self.get_filtered_content(spec, false).await
    }

    fn generate(&self, spec: &FilterSpec, source: &str) -> Result<(Arc<str>, usize)> {
        self.stats.write().recomputes += 1;

        let start = Instant::now();
        let events = match self.codec.parse_events(source) {
            Ok(events) => events,
            Err(err) => {
                warn!(
                    filter_id = %spec.id(),
                    url = spec.source_url(),
                    error = %err,
                    "source calendar unparseable, treating as empty"
                );
                Vec::new()
            }
        };
        self.metrics
            .record_latency(CacheOperation::Parse, start.elapsed());

        let start = Instant::now();
        let selected = engine::apply_filter(events, spec);
        self.metrics
            .record_latency(CacheOperation::Filter, start.elapsed());

        let start = Instant::now();
        let content = self.codec.serialize_events(&selected)?;
        self.metrics
            .record_latency(CacheOperation::Serialize, start.elapsed());

        Ok((Arc::from(content), selected.len()))
    }

    /// Distinct event types in the calendar at `url`, with counts
    ///
    /// Reads through the source cache, so repeated calls share its TTL.
    pub async fn event_types(&self, url: &str) -> Result<Vec<(String, usize)>> {
        let source = self.sources.get_content(url, self.source_ttl()).await?;
        let events = self.codec.parse_events(&source)?;
        Ok(engine::event_types(&events))
    }

    /// Copy of the cached output for a filter
    pub async fn entry(&self, filter_id: &FilterId) -> Option<FilteredCacheEntry> {
        self.entries.snapshot(filter_id.as_str()).await.flatten()
    }

    /// Drop the cached output for a filter; its source entry is kept
    pub async fn remove(&self, filter_id: &FilterId) -> bool {
        self.entries.remove(filter_id.as_str()).await
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
            recomputes: stats.recomputes,
            size: self.entries.len(),
            ..CacheStats::default()
        }
    }
}

impl<F, C, M> Clone for FilteredCalendarCache<F, C, M>
where
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    fn clone(&self) -> Self {
        Self {
            sources: self.sources.clone(),
            codec: self.codec.clone(),
            metrics: self.metrics.clone(),
            entries: self.entries.clone(),
            stats: self.stats.clone(),
            config: self.config.clone(),
        }
    }
}
