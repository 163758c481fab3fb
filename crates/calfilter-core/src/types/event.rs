//! Parsed calendar event

use serde::{Deserialize, Serialize};

/// Type key of events that carry no summary
pub const UNTITLED_EVENT_TYPE: &str = "(No title)";

/// One `VEVENT` from a source calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Verbatim `BEGIN:VEVENT` .. `END:VEVENT` block, one entry per line
    pub raw: String,
}

impl Event {
    /// Create an event carrying only its raw block
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            uid: None,
            summary: None,
            start: None,
            end: None,
            location: None,
            description: None,
            raw: raw.into(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Key a filter selects this event by
    ///
    /// The trimmed summary, or [`UNTITLED_EVENT_TYPE`] when absent or blank.
    pub fn event_type(&self) -> &str {
        self.summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNTITLED_EVENT_TYPE)
    }
}
