//! Event selection and output fingerprinting
//!
//! Pure functions: nothing here touches the caches or the network.

use sha2::{Digest, Sha256};

use calfilter_core::{Event, FilterSpec, Fingerprint};

const FINGERPRINT_TAG: &[u8] = b"calfilter.fingerprint.v1";

/// Fingerprint of everything that determines a filter's output
///
/// Covers the full source text and the selected type set. Every field is
/// length-prefixed, so no two distinct inputs share a preimage. The set is
/// hashed in sorted order, so insertion order never matters.
pub fn compute_fingerprint(source_content: &str, spec: &FilterSpec) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_TAG);
    update_field(&mut hasher, source_content.as_bytes());

    let selected = spec.selected_event_types();
    hasher.update((selected.len() as u64).to_le_bytes());
    for event_type in selected {
        update_field(&mut hasher, event_type.as_bytes());
    }

    Fingerprint::from_hex(hex::encode(hasher.finalize()))
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Keep the events whose type the filter selects, in source order
pub fn apply_filter(events: Vec<Event>, spec: &FilterSpec) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| spec.selects(event.event_type()))
        .collect()
}

/// Distinct event types with their counts, in first-seen order
pub fn event_types(events: &[Event]) -> Vec<(String, usize)> {
    let mut types: Vec<(String, usize)> = Vec::new();
    for event in events {
        let event_type = event.event_type();
        match types.iter_mut().find(|(name, _)| name.as_str() == event_type) {
            Some((_, count)) => *count += 1,
            None => types.push((event_type.to_string(), 1)),
        }
    }
    types
}
