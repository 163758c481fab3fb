//! Core types for calendar caching

mod entry;
mod event;
mod filter;
mod outcome;
mod stats;

pub use entry::{FilteredCacheEntry, SourceCacheEntry, Validator};
pub use event::{Event, UNTITLED_EVENT_TYPE};
pub use filter::{FilterId, FilterRecord, FilterSpec, Fingerprint};
pub use outcome::{FetchOutcome, FetchStatus};
pub use stats::CacheStats;
