//! In-memory filter record store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use calfilter_core::{CalendarError, FilterId, FilterRecord, FilterStore, Result};

/// Filter definitions held in memory
///
/// Cloning creates a new handle to the SAME underlying records.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilterStore {
    records: Arc<RwLock<BTreeMap<FilterId, FilterRecord>>>,
}

impl MemoryFilterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given records
    pub fn from_records(records: impl IntoIterator<Item = FilterRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Load records from a JSON array
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<FilterRecord> =
            serde_json::from_str(json).map_err(|e| CalendarError::Store(e.to_string()))?;
        Ok(Self::from_records(records))
    }

    /// Insert or replace a record, returning the previous version
    pub fn insert(&self, record: FilterRecord) -> Option<FilterRecord> {
        self.records.write().insert(record.id().clone(), record)
    }

    /// Remove a record
    pub fn remove(&self, id: &FilterId) -> Option<FilterRecord> {
        self.records.write().remove(id)
    }

    /// Get the number of records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl FilterStore for MemoryFilterStore {
    async fn get(&self, id: &FilterId) -> Result<Option<FilterRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<FilterRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }
}
