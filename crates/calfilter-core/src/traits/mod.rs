//! Core traits for calendar caching

mod codec;
mod fetcher;
mod metrics;
mod store;

#[cfg(feature = "tracing")]
mod tracing;

pub use codec::CalendarCodec;
pub use fetcher::Fetcher;
pub use metrics::{CacheMetrics, CacheOperation, CacheTier, NoopMetrics};
pub use store::FilterStore;

#[cfg(feature = "metrics")]
pub use metrics::MetricsCrateAdapter;

#[cfg(feature = "tracing")]
pub use self::tracing::TracingMetrics;
