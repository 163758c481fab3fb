use crate::{CacheMetrics, CacheOperation, CacheTier, FetchStatus};
use std::time::Duration;
use tracing::{debug, warn};

/// Metrics adapter that logs events via `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingMetrics {
    /// Service name/prefix (optional)
    service_name: Option<String>,
}

impl TracingMetrics {
    /// Create new tracing metrics adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with service name prefix
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }
}

impl CacheMetrics for TracingMetrics {
    fn record_hit(&self, key: &str, tier: CacheTier) {
        debug!(
            target: "calfilter",
            event = "hit",
            key = %key,
            tier = tier.as_str(),
            service = ?self.service_name,
            "Cache Hit"
        );
    }

    fn record_miss(&self, key: &str, tier: CacheTier) {
        debug!(
            target: "calfilter",
            event = "miss",
            key = %key,
            tier = tier.as_str(),
            service = ?self.service_name,
            "Cache Miss"
        );
    }

    fn record_stale_hit(&self, key: &str) {
        debug!(
            target: "calfilter",
            event = "stale_hit",
            key = %key,
            service = ?self.service_name,
            "Served stale content"
        );
    }

    fn record_fetch(&self, url: &str, status: FetchStatus) {
        debug!(
            target: "calfilter",
            event = "fetch",
            url = %url,
            status = status.as_str(),
            service = ?self.service_name,
            "Upstream fetch"
        );
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        tracing::trace!(
            target: "calfilter",
            event = "latency",
            operation = operation.as_str(),
            duration_ms = duration.as_millis(),
            service = ?self.service_name,
            "Cache Operation Latency"
        );
    }

    fn record_refresh_failure(&self, filter_id: &str) {
        warn!(
            target: "calfilter",
            event = "refresh_failure",
            filter_id = %filter_id,
            service = ?self.service_name,
            "Scheduled refresh failed"
        );
    }
}
