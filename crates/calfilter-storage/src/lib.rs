//! calfilter-storage: In-memory storage for calfilter

pub mod memory;

pub use memory::{KeyedStore, MemoryFilterStore, Slot};
