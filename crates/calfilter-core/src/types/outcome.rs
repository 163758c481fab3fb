//! Fetch outcome type

use super::entry::Validator;

/// Result of one conditional GET against a source URL
///
/// Fetchers never return errors; transport failures, timeouts and unexpected
/// status codes are all reported as [`FetchOutcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// `200`: new body and its validator
    Fresh { content: String, validator: Validator },
    /// `304`: the cached body is still current
    NotModified,
    /// Anything else
    Failed { reason: String },
}

/// Outcome label for metrics and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    Fresh,
    NotModified,
    Failed,
}

impl FetchStatus {
    /// Get status as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Fresh => "fresh",
            FetchStatus::NotModified => "not_modified",
            FetchStatus::Failed => "failed",
        }
    }
}

impl FetchOutcome {
    /// Shorthand for a failure
    pub fn failed(reason: impl Into<String>) -> Self {
        FetchOutcome::Failed {
            reason: reason.into(),
        }
    }

    /// Check if this is a `200`
    pub fn is_fresh(&self) -> bool {
        matches!(self, FetchOutcome::Fresh { .. })
    }

    /// Check if this is a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed { .. })
    }

    pub fn status(&self) -> FetchStatus {
        match self {
            FetchOutcome::Fresh { .. } => FetchStatus::Fresh,
            FetchOutcome::NotModified => FetchStatus::NotModified,
            FetchOutcome::Failed { .. } => FetchStatus::Failed,
        }
    }
}
