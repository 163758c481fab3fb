//! calfilter-http: Conditional HTTP fetching for calfilter

pub mod config;
pub mod fetcher;

pub use config::FetcherConfig;
pub use fetcher::{HttpFetcher, normalize_url};
