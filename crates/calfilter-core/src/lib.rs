//! calfilter-core: Core traits and types for the calfilter library
//!
//! This crate provides the data model shared by every calfilter layer
//! (cache entries, filter specifications, parsed events, fetch outcomes)
//! together with the collaborator traits the caches are generic over.

mod error;
mod traits;
mod types;

pub use error::{CalendarError, Result};
pub use traits::*;
pub use types::*;
