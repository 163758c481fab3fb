//! Writing events back into a VCALENDAR

use calfilter_core::Event;

const CRLF: &str = "\r\n";

/// Render `events` inside a fixed VCALENDAR envelope
///
/// Output depends only on the inputs, so identical event lists always
/// produce identical bytes.
pub(crate) fn generate_calendar(events: &[Event], prodid: &str, name: Option<&str>) -> String {
    let body: usize = events.iter().map(|e| e.raw.len() + CRLF.len()).sum();
    let mut out = String::with_capacity(body + 160);

    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{prodid}"));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    push_line(&mut out, "METHOD:PUBLISH");
    if let Some(name) = name {
        push_line(&mut out, &format!("X-WR-CALNAME:{}", escape_text(name)));
    }
    for event in events {
        for line in event.raw.lines() {
            push_line(&mut out, line);
        }
    }
    push_line(&mut out, "END:VCALENDAR");
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}
