//! Metrics trait for cache observability

use std::time::Duration;

use crate::FetchStatus;

/// Cache layer for metrics labeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    /// Raw source calendars keyed by URL
    Source,
    /// Derived calendars keyed by filter id
    Filtered,
}

impl CacheTier {
    /// Get tier as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Source => "source",
            CacheTier::Filtered => "filtered",
        }
    }
}

/// Cache operation for latency tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Fetch,
    Parse,
    Filter,
    Serialize,
    Refresh,
}

impl CacheOperation {
    /// Get operation as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Fetch => "fetch",
            CacheOperation::Parse => "parse",
            CacheOperation::Filter => "filter",
            CacheOperation::Serialize => "serialize",
            CacheOperation::Refresh => "refresh",
        }
    }
}

/// Trait for cache metrics/observability
///
/// Implement this to integrate with your metrics system (Prometheus, StatsD, etc.)
pub trait CacheMetrics: Send + Sync + 'static {
    /// Record a request served from memory
    fn record_hit(&self, key: &str, tier: CacheTier);

    /// Record a request that had to fetch or recompute
    fn record_miss(&self, key: &str, tier: CacheTier);

    /// Record stale content served after a failed fetch
    fn record_stale_hit(&self, key: &str);

    /// Record the classification of an upstream fetch
    fn record_fetch(&self, url: &str, status: FetchStatus);

    /// Record operation latency
    fn record_latency(&self, operation: CacheOperation, duration: Duration);

    /// Record a scheduled refresh that failed
    fn record_refresh_failure(&self, filter_id: &str);
}

/// No-op metrics implementation (default)
///
/// Zero overhead when metrics are not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    #[inline]
    fn record_hit(&self, _key: &str, _tier: CacheTier) {}

    #[inline]
    fn record_miss(&self, _key: &str, _tier: CacheTier) {}

    #[inline]
    fn record_stale_hit(&self, _key: &str) {}

    #[inline]
    fn record_fetch(&self, _url: &str, _status: FetchStatus) {}

    #[inline]
    fn record_latency(&self, _operation: CacheOperation, _duration: Duration) {}

    #[inline]
    fn record_refresh_failure(&self, _filter_id: &str) {}
}

/// Metrics adapter using the `metrics` crate
///
/// # Example
/// ```ignore
/// use calfilter_core::MetricsCrateAdapter;
///
/// let metrics = MetricsCrateAdapter::new("calfilter");
/// // Emits: calfilter_hits_total, calfilter_fetches_total, etc.
/// ```
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsCrateAdapter {
    prefix: String,
}

#[cfg(feature = "metrics")]
impl MetricsCrateAdapter {
    /// Create a new adapter with the given metric name prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn metric_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }
}

#[cfg(feature = "metrics")]
impl CacheMetrics for MetricsCrateAdapter {
    fn record_hit(&self, _key: &str, tier: CacheTier) {
        metrics::counter!(self.metric_name("hits_total"), "tier" => tier.as_str()).increment(1);
    }

    fn record_miss(&self, _key: &str, tier: CacheTier) {
        metrics::counter!(self.metric_name("misses_total"), "tier" => tier.as_str()).increment(1);
    }

    fn record_stale_hit(&self, _key: &str) {
        metrics::counter!(self.metric_name("stale_hits_total")).increment(1);
    }

    fn record_fetch(&self, _url: &str, status: FetchStatus) {
        metrics::counter!(self.metric_name("fetches_total"), "status" => status.as_str())
            .increment(1);
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        metrics::histogram!(
            self.metric_name("operation_duration_seconds"),
            "operation" => operation.as_str()
        )
        .record(duration.as_secs_f64());
    }

    fn record_refresh_failure(&self, _filter_id: &str) {
        metrics::counter!(self.metric_name("refresh_failures_total")).increment(1);
    }
}
