//! Feed routes

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use calfilter::{
    CacheMetrics, CalendarCodec, CalendarError, Fetcher, FilterId, FilterStore,
    FilteredCalendarCache,
};

use crate::FeedError;

const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Shared state for the feed routes
pub struct FeedState<S, F, C, M>
where
    S: FilterStore,
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    store: Arc<S>,
    cache: FilteredCalendarCache<F, C, M>,
}

impl<S, F, C, M> FeedState<S, F, C, M>
where
    S: FilterStore,
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    pub fn new(store: S, cache: FilteredCalendarCache<F, C, M>) -> Self {
        Self::with_shared_store(Arc::new(store), cache)
    }

    /// Use a store that is also held elsewhere, e.g. by an admin API
    pub fn with_shared_store(store: Arc<S>, cache: FilteredCalendarCache<F, C, M>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &FilteredCalendarCache<F, C, M> {
        &self.cache
    }
}

impl<S, F, C, M> Clone for FeedState<S, F, C, M>
where
    S: FilterStore,
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FeedParams {
    #[serde(default)]
    download: bool,
}

/// Router serving `GET /feeds/{id}`
///
/// The response is the filter's cached calendar, suitable as a
/// subscription URL; `?download=true` asks the browser to save it.
pub fn feed_router<S, F, C, M>(state: FeedState<S, F, C, M>) -> Router
where
    S: FilterStore,
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    Router::new()
        .route("/feeds/{id}", get(serve_feed::<S, F, C, M>))
        .with_state(state)
}

async fn serve_feed<S, F, C, M>(
    State(state): State<FeedState<S, F, C, M>>,
    Path(id): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<Response, FeedError>
where
    S: FilterStore,
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    let id = FilterId::new(id);
    let record = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| CalendarError::FilterNotFound(id.to_string()))?;

    let content = state
        .cache
        .get_filtered_content(&record.spec, false)
        .await?;
    debug!(filter_id = %id, bytes = content.len(), download = params.download, "serving feed");

    let disposition = if params.download {
        "attachment"
    } else {
        "inline"
    };
    let filename = attachment_name(&record.name, &id);
    Ok((
        [
            (header::CONTENT_TYPE, CALENDAR_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("{disposition}; filename=\"{filename}.ics\""),
            ),
        ],
        content.to_string(),
    )
        .into_response())
}

/// Filename stem safe to place in a quoted header parameter
fn attachment_name(name: &str, id: &FilterId) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(|c| c == '_' || c == ' ').is_empty() {
        id.to_string()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .collect()
    } else {
        cleaned
    }
}
