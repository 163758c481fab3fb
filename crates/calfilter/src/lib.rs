//! calfilter: cached, filtered views of ICS calendar feeds
//!
//! # Features
//!
//! - **Source cache** with conditional GETs (`ETag` / `Last-Modified`)
//! - **Stale-on-failure**: a feed that ever loaded keeps serving
//! - **Fingerprint memoization**: unchanged input never reparses
//! - **Background refresh** on per-filter intervals
//! - **Metrics integration**
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use calfilter::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let sources = SourceCalendarCache::new(HttpFetcher::with_defaults()?);
//!     let cache = FilteredCalendarCache::new(sources, IcsCodec::new());
//!
//!     let spec = FilterSpec::new("gym", "webcal://example.com/team.ics", ["Gym"]);
//!     let ics = cache.get_filtered_content(&spec, false).await?;
//!     println!("{ics}");
//!
//!     for (event_type, count) in cache.event_types(spec.source_url()).await? {
//!         println!("{event_type}: {count}");
//!     }
//!
//!     Ok(())
//! }
//! ```

mod codec;
pub mod engine;
mod filtered;
mod scheduler;
mod source;

#[cfg(test)]
mod testing;

// Re-export core
pub use calfilter_core::*;

// Re-export fetching and storage
pub use calfilter_http::{FetcherConfig, HttpFetcher, normalize_url};
pub use calfilter_storage::MemoryFilterStore;

pub use codec::{DEFAULT_PRODID, IcsCodec};
pub use filtered::{FilteredCacheConfig, FilteredCalendarCache};
pub use scheduler::{RefreshScheduler, SchedulerConfig, TaskState, TaskStatus};
pub use source::{SourceCacheConfig, SourceCalendarCache};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CalendarCodec, CalendarError, FetcherConfig, FilterId, FilterRecord, FilterSpec, FilterStore,
        FilteredCacheConfig, FilteredCalendarCache, HttpFetcher, IcsCodec, MemoryFilterStore,
        RefreshScheduler, Result, SchedulerConfig, SourceCacheConfig, SourceCalendarCache,
        TaskState,
    };

    #[cfg(feature = "tracing-metrics")]
    pub use crate::TracingMetrics;

    #[cfg(feature = "metrics")]
    pub use crate::MetricsCrateAdapter;
}
