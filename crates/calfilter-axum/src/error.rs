//! Mapping cache errors onto HTTP responses

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use calfilter::CalendarError;
use tracing::warn;

/// Seconds a client should wait before retrying an unavailable feed
const RETRY_AFTER_SECS: &str = "300";

/// Error returned by feed handlers
#[derive(Debug)]
pub struct FeedError(pub CalendarError);

impl From<CalendarError> for FeedError {
    fn from(err: CalendarError) -> Self {
        Self(err)
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        match self.0 {
            CalendarError::FilterNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("unknown feed: {id}")).into_response()
            }
            err @ CalendarError::NoContentAvailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
                err.to_string(),
            )
                .into_response(),
            err => {
                warn!(error = %err, "feed request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "feed could not be produced").into_response()
            }
        }
    }
}
