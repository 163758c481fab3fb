//! Cache entry types

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use super::filter::{FilterId, Fingerprint};

/// HTTP revalidation tokens captured from the last `200` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// `ETag` response header
    pub etag: Option<String>,
    /// `Last-Modified` response header
    pub last_modified: Option<String>,
}

impl Validator {
    /// Create a validator from optional header values
    pub fn new(etag: Option<String>, last_modified: Option<String>) -> Self {
        Self {
            etag,
            last_modified,
        }
    }

    /// Validator carrying only an ETag
    pub fn etag(etag: impl Into<String>) -> Self {
        Self::new(Some(etag.into()), None)
    }

    /// True when no conditional header can be sent
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Cached state for one source calendar URL
///
/// Created empty on the first request for a URL and mutated in place on
/// every fetch. Once `content` is set it is never cleared.
#[derive(Debug, Clone)]
pub struct SourceCacheEntry {
    /// Cache key
    pub url: String,
    /// Last successfully retrieved calendar text
    pub content: Option<Arc<str>>,
    /// Revalidation tokens from the most recent `200`
    pub validator: Validator,
    /// When the entry was last fetched, revalidated or retried
    pub last_updated_at: Option<SystemTime>,
    /// TTL the entry was last evaluated against
    pub ttl: Duration,
    /// Monotonic twin of `last_updated_at`, used for TTL checks
    updated: Option<Instant>,
}

impl SourceCacheEntry {
    /// Create an empty entry that has never been fetched
    pub fn new(url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            url: url.into(),
            content: None,
            validator: Validator::default(),
            last_updated_at: None,
            ttl,
            updated: None,
        }
    }

    /// Check if content exists from a prior successful fetch
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Time since the entry was last updated
    ///
    /// Measured on the monotonic clock, so wall-clock steps do not
    /// extend or cut short the TTL.
    pub fn age(&self) -> Option<Duration> {
        self.updated.map(|at| at.elapsed())
    }

    /// Check if content may be served without a network call
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.has_content() && self.age().is_some_and(|age| age < ttl)
    }

    /// Record a `200` response
    pub fn store(&mut self, content: Arc<str>, validator: Validator) {
        self.content = Some(content);
        self.validator = validator;
        self.touch();
    }

    /// Advance `last_updated_at` without touching content or validator
    pub fn touch(&mut self) {
        self.last_updated_at = Some(SystemTime::now());
        self.updated = Some(Instant::now());
    }
}

/// Memoized output of one filter
#[derive(Debug, Clone)]
pub struct FilteredCacheEntry {
    /// Owning filter
    pub filter_id: FilterId,
    /// Serialized output calendar
    pub filtered_content: Arc<str>,
    /// Digest of the inputs `filtered_content` was generated from
    pub fingerprint: Fingerprint,
    /// Number of events in `filtered_content`
    pub event_count: usize,
    /// When the output was generated
    pub last_generated_at: SystemTime,
    generated: Instant,
}

impl FilteredCacheEntry {
    /// Create an entry generated now
    pub fn new(
        filter_id: FilterId,
        filtered_content: Arc<str>,
        fingerprint: Fingerprint,
        event_count: usize,
    ) -> Self {
        Self {
            filter_id,
            filtered_content,
            fingerprint,
            event_count,
            last_generated_at: SystemTime::now(),
            generated: Instant::now(),
        }
    }

    /// Check if the entry was generated from the given inputs
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        &self.fingerprint == fingerprint
    }

    /// Get age of the entry
    pub fn age(&self) -> Duration {
        self.generated.elapsed()
    }
}
