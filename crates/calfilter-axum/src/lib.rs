//! calfilter-axum: serve filtered calendars as subscription feeds
//!
//! ```rust,no_run
//! use calfilter::prelude::*;
//! use calfilter_axum::{FeedState, feed_router};
//!
//! # async fn run(store: MemoryFilterStore) -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let sources = SourceCalendarCache::new(HttpFetcher::with_defaults()?);
//! let cache = FilteredCalendarCache::new(sources, IcsCodec::new());
//! let app = feed_router(FeedState::new(store, cache));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod router;

pub use error::FeedError;
pub use router::{FeedState, feed_router};
