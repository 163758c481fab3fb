//! Calendar parser/serializer trait

use crate::{Event, Result};

/// Converts between calendar text and events
pub trait CalendarCodec: Send + Sync + 'static {
    /// Split calendar text into its events, in document order
    fn parse_events(&self, text: &str) -> Result<Vec<Event>>;

    /// Wrap events in a complete `VCALENDAR` document
    fn serialize_events(&self, events: &[Event]) -> Result<String>;
}
