//! Conditional fetcher trait

use async_trait::async_trait;

use crate::{FetchOutcome, Validator};

/// Performs one GET against a source calendar URL
///
/// Implementations attach `If-None-Match` / `If-Modified-Since` from the
/// given validator, issue exactly one network call without retrying, bound
/// it with a timeout, and classify the response. They never fail: every
/// error is folded into [`FetchOutcome::Failed`].
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch `url`, revalidating against `validator` when it is non-empty
    async fn fetch(&self, url: &str, validator: &Validator) -> FetchOutcome;
}
