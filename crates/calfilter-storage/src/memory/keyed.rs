//! Concurrent map of independently locked entries

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A single lockable entry
pub type Slot<T> = Arc<Mutex<T>>;

/// Map from key to a per-key async mutex
///
/// The `DashMap` shard lock is held only long enough to find or insert a
/// slot; all work on an entry happens under that entry's own mutex, so
/// callers for the same key are serialized while unrelated keys proceed in
/// parallel. Removal also takes the entry's mutex, and [`lock`](Self::lock)
/// never hands out a slot that was removed while it waited, so the
/// serialization holds across removals. Cloning creates a new handle to the
/// SAME underlying store.
pub struct KeyedStore<T> {
    slots: Arc<DashMap<String, Slot<T>>>,
}

impl<T: Send + 'static> KeyedStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Get the slot for `key`, inserting `init()` if absent
    pub fn slot(&self, key: &str, init: impl FnOnce() -> T) -> Slot<T> {
        if let Some(slot) = self.slots.get(key) {
            return slot.clone();
        }
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    /// Lock the entry for `key`, inserting `init()` if absent
    ///
    /// If the slot is removed while this call waits for it, the wait starts
    /// over on the slot that replaced it.
    pub async fn lock(&self, key: &str, init: impl Fn() -> T) -> OwnedMutexGuard<T> {
        loop {
            let slot = self.slot(key, &init);
            let guard = slot.clone().lock_owned().await;
            if self.is_current(key, &slot) {
                return guard;
            }
        }
    }

    /// Get the slot for `key` if present
    pub fn get(&self, key: &str) -> Option<Slot<T>> {
        self.slots.get(key).map(|slot| slot.clone())
    }

    /// Remove a key once its current holder releases it
    ///
    /// Returns `true` if this call removed the key.
    pub async fn remove(&self, key: &str) -> bool {
        let Some(slot) = self.get(key) else {
            return false;
        };
        let _guard = slot.lock().await;
        self.slots
            .remove_if(key, |_, current| Arc::ptr_eq(current, &slot))
            .is_some()
    }

    fn is_current(&self, key: &str, slot: &Slot<T>) -> bool {
        self.slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current.value(), slot))
    }

    /// Check if a key exists
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// All keys currently stored
    pub fn keys(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.key().clone()).collect()
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T: Clone + Send + 'static> KeyedStore<T> {
    /// Copy of the entry for `key`, waiting for any in-flight update
    pub async fn snapshot(&self, key: &str) -> Option<T> {
        let slot = self.get(key)?;
        let value = slot.lock().await.clone();
        Some(value)
    }
}

impl<T: Send + 'static> Default for KeyedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for KeyedStore<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}
