//! Error types for calendar cache operations

use thiserror::Error;

/// Main error type for all calfilter operations
///
/// Upstream fetch failures are not represented here: a fetcher reports them
/// as [`FetchOutcome::Failed`](crate::FetchOutcome::Failed) and the source
/// cache only escalates to [`CalendarError::NoContentAvailable`] when it has
/// nothing to fall back on.
#[derive(Error, Debug, Clone)]
pub enum CalendarError {
    /// The source has never been fetched successfully
    #[error("no content available for {url}: {reason}")]
    NoContentAvailable { url: String, reason: String },

    /// Calendar text could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Filter id is unknown to the record store
    #[error("filter not found: {0}")]
    FilterNotFound(String),

    /// Record store operation failed
    #[error("store error: {0}")]
    Store(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Scheduler was started twice
    #[error("scheduler already running")]
    AlreadyRunning,

    /// Scheduler was stopped while not running
    #[error("scheduler not running")]
    NotRunning,

    /// Timeout
    #[error("operation timed out")]
    Timeout,
}

impl CalendarError {
    /// Check if this error means the caller has nothing to serve
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CalendarError::NoContentAvailable { .. })
    }
}

/// Result type alias for calfilter operations
pub type Result<T> = std::result::Result<T, CalendarError>;
