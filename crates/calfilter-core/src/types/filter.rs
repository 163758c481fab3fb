//! Filter specification and persisted filter records

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a filter definition
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(String);

impl FilterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FilterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which events of a source calendar a derived calendar keeps
///
/// Immutable: updating a filter means building a new spec with the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    id: FilterId,
    source_url: String,
    selected_event_types: BTreeSet<String>,
}

impl FilterSpec {
    /// Create a filter spec
    pub fn new<I, S>(id: impl Into<FilterId>, source_url: impl Into<String>, selected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            selected_event_types: selected.into_iter().map(Into::into).collect(),
        }
    }

    pub fn id(&self) -> &FilterId {
        &self.id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Selected type keys, in sorted order
    pub fn selected_event_types(&self) -> &BTreeSet<String> {
        &self.selected_event_types
    }

    /// Check if a type key is selected
    pub fn selects(&self, event_type: &str) -> bool {
        self.selected_event_types.contains(event_type)
    }
}

/// Filter definition as kept by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRecord {
    #[serde(flatten)]
    pub spec: FilterSpec,
    /// Display name, also used for the served file name
    pub name: String,
    /// Served as an auto-updating subscription
    #[serde(default)]
    pub live: bool,
}

impl FilterRecord {
    pub fn new(spec: FilterSpec, name: impl Into<String>) -> Self {
        Self {
            spec,
            name: name.into(),
            live: false,
        }
    }

    /// Mark the filter as a live subscription
    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }

    pub fn id(&self) -> &FilterId {
        self.spec.id()
    }
}

/// Deterministic digest of a filter's inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already hex-encoded digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
