//! iCalendar (.ics) codec

mod generate;
mod parse;

use calfilter_core::{CalendarCodec, Event, Result};

/// `PRODID` written on generated calendars
pub const DEFAULT_PRODID: &str = "-//calfilter//calfilter//EN";

/// Codec for RFC 5545 text
///
/// Parsing keeps each VEVENT block verbatim, so filtered output carries
/// every property the source had. Serialization wraps the kept blocks in
/// a fixed envelope.
#[derive(Debug, Clone)]
pub struct IcsCodec {
    prodid: String,
    calendar_name: Option<String>,
}

impl IcsCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `PRODID` of generated calendars
    pub fn with_prodid(mut self, prodid: impl Into<String>) -> Self {
        self.prodid = prodid.into();
        self
    }

    /// Emit `X-WR-CALNAME` on generated calendars
    pub fn with_calendar_name(mut self, name: impl Into<String>) -> Self {
        self.calendar_name = Some(name.into());
        self
    }
}

impl Default for IcsCodec {
    fn default() -> Self {
        Self {
            prodid: DEFAULT_PRODID.to_string(),
            calendar_name: None,
        }
    }
}

impl CalendarCodec for IcsCodec {
    fn parse_events(&self, text: &str) -> Result<Vec<Event>> {
        parse::parse_calendar(text)
    }

    fn serialize_events(&self, events: &[Event]) -> Result<String> {
        Ok(generate::generate_calendar(
            events,
            &self.prodid,
            self.calendar_name.as_deref(),
        ))
    }
}
