//! Test doubles shared by the unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use calfilter_core::{CalendarCodec, Event, FetchOutcome, Fetcher, Result, Validator};

use crate::IcsCodec;

/// Build a calendar holding one event per `(uid, summary)`
pub(crate) fn calendar(events: &[(&str, &str)]) -> String {
    let mut out = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\n");
    for (uid, summary) in events {
        out.push_str(&format!(
            "BEGIN:VEVENT\r\nUID:{uid}\r\nDTSTART:20240101T090000Z\r\nSUMMARY:{summary}\r\nEND:VEVENT\r\n"
        ));
    }
    out.push_str("END:VCALENDAR\r\n");
    out
}

pub(crate) fn fresh(content: &str, etag: Option<&str>) -> FetchOutcome {
    FetchOutcome::Fresh {
        content: content.to_string(),
        validator: Validator::new(etag.map(str::to_string), None),
    }
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<FetchOutcome>>,
    fallback: HashMap<String, FetchOutcome>,
    calls: Vec<(String, Validator)>,
}

/// Fetcher answering from a per-URL script
///
/// Queued outcomes are used once, in order; after that the URL's fallback
/// answers every call.
#[derive(Clone, Default)]
pub(crate) struct ScriptedFetcher {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, url: &str, outcome: FetchOutcome) {
        self.script
            .lock()
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub(crate) fn always(&self, url: &str, outcome: FetchOutcome) {
        self.script.lock().fallback.insert(url.to_string(), outcome);
    }

    pub(crate) fn calls(&self, url: &str) -> Vec<Validator> {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|(called, _)| called == url)
            .map(|(_, validator)| validator.clone())
            .collect()
    }

    pub(crate) fn call_count(&self, url: &str) -> usize {
        self.calls(url).len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, validator: &Validator) -> FetchOutcome {
        let mut script = self.script.lock();
        script.calls.push((url.to_string(), validator.clone()));
        if let Some(outcome) = script.queued.get_mut(url).and_then(VecDeque::pop_front) {
            return outcome;
        }
        script
            .fallback
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchOutcome::failed("no scripted response"))
    }
}

/// `IcsCodec` that counts how often it runs
#[derive(Clone, Default)]
pub(crate) struct CountingCodec {
    inner: IcsCodec,
    parses: Arc<AtomicUsize>,
    serializes: Arc<AtomicUsize>,
}

impl CountingCodec {
    pub(crate) fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub(crate) fn serializes(&self) -> usize {
        self.serializes.load(Ordering::SeqCst)
    }
}

impl CalendarCodec for CountingCodec {
    fn parse_events(&self, text: &str) -> Result<Vec<Event>> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        self.inner.parse_events(text)
    }

    fn serialize_events(&self, events: &[Event]) -> Result<String> {
        self.serializes.fetch_add(1, Ordering::SeqCst);
        self.inner.serialize_events(events)
    }
}
