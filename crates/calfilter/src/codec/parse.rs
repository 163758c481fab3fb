//! Splitting a VCALENDAR body into events

use icalendar::parser::{Component, read_calendar, unfold};

use calfilter_core::{CalendarError, Event, Result};

/// Split `text` into its VEVENT blocks
///
/// Each block keeps its lines exactly as received (folding, unknown
/// properties, nested VALARMs) so it can be written back unchanged.
/// Line endings are normalized to CRLF.
pub(crate) fn parse_calendar(text: &str) -> Result<Vec<Event>> {
    let mut saw_calendar = false;
    let mut events = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        let marker = line.trim_end();
        match current.as_mut() {
            None => {
                if marker.eq_ignore_ascii_case("BEGIN:VCALENDAR") {
                    saw_calendar = true;
                } else if marker.eq_ignore_ascii_case("BEGIN:VEVENT") {
                    current = Some(vec![line]);
                }
            }
            Some(lines) => {
                if marker.eq_ignore_ascii_case("BEGIN:VEVENT") {
                    return Err(CalendarError::Parse("nested VEVENT".to_string()));
                }
                lines.push(line);
                if marker.eq_ignore_ascii_case("END:VEVENT") {
                    let raw = lines.join("\r\n");
                    current = None;
                    events.push(parse_event(raw)?);
                }
            }
        }
    }

    if current.is_some() {
        return Err(CalendarError::Parse("unterminated VEVENT".to_string()));
    }
    if !saw_calendar {
        return Err(CalendarError::Parse("missing BEGIN:VCALENDAR".to_string()));
    }
    Ok(events)
}

fn parse_event(raw: String) -> Result<Event> {
    let unfolded = unfold(&raw);
    let calendar = read_calendar(&unfolded).map_err(|e| CalendarError::Parse(e.to_string()))?;
    let vevent = find_vevent(&calendar.components)
        .ok_or_else(|| CalendarError::Parse("VEVENT block could not be read".to_string()))?;

    let text = |name: &str| vevent.find_prop(name).map(|p| unescape_text(p.val.as_ref()));
    let value = |name: &str| vevent.find_prop(name).map(|p| p.val.to_string());

    let (uid, summary, location, description) =
        (value("UID"), text("SUMMARY"), text("LOCATION"), text("DESCRIPTION"));
    let (start, end) = (value("DTSTART"), value("DTEND"));

    Ok(Event {
        uid,
        summary,
        start,
        end,
        location,
        description,
        raw,
    })
}

fn find_vevent<'c, 'a>(components: &'c [Component<'a>]) -> Option<&'c Component<'a>> {
    components.iter().find_map(|c| {
        if c.name == "VEVENT" {
            Some(c)
        } else {
            find_vevent(&c.components)
        }
    })
}

/// Undo RFC 5545 TEXT escaping
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
