//! Cache statistics

/// Statistics for one cache layer
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Requests served from memory
    pub hits: u64,
    /// Requests that needed a fetch or a recompute
    pub misses: u64,
    /// Requests served stale after a failed fetch
    pub stale_hits: u64,
    /// Network fetches issued
    pub fetches: u64,
    /// Fetches answered with `304`
    pub not_modified: u64,
    /// Fetches that failed
    pub fetch_failures: u64,
    /// Parse/filter/serialize runs
    pub recomputes: u64,
    /// Current number of entries
    pub size: usize,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total requests (hits + misses)
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}
