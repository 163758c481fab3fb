//! Filter record store trait

use async_trait::async_trait;

use crate::{FilterId, FilterRecord, Result};

/// Read access to persisted filter definitions
#[async_trait]
pub trait FilterStore: Send + Sync + 'static {
    /// Look up a filter by id
    async fn get(&self, id: &FilterId) -> Result<Option<FilterRecord>>;

    /// All filters, ordered by id
    async fn list(&self) -> Result<Vec<FilterRecord>>;

    /// Filters served as live subscriptions
    async fn live_filters(&self) -> Result<Vec<FilterRecord>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|record| record.live)
            .collect())
    }
}
