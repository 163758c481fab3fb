//! In-memory stores

mod filter_store;
mod keyed;

pub use filter_store::MemoryFilterStore;
pub use keyed::{KeyedStore, Slot};
