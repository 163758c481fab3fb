//! Conditional GET over reqwest

use async_trait::async_trait;
use reqwest::header::{ETAG, HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use std::borrow::Cow;
use tracing::debug;

use calfilter_core::{CalendarError, FetchOutcome, Fetcher, Result, Validator};

use crate::FetcherConfig;

/// Fetches source calendars with `If-None-Match` / `If-Modified-Since`
///
/// One request per call and no retries; the retry cadence belongs to the
/// source cache TTL and the refresh scheduler.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher from config
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| CalendarError::Config(e.to_string()))?;
        Ok(Self { client })
    }

    /// Build a fetcher with default timeouts
    pub fn with_defaults() -> Result<Self> {
        Self::new(FetcherConfig::default())
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, validator: &Validator) -> FetchOutcome {
        let target = normalize_url(url);
        let mut request = self.client.get(target.as_ref());
        if let Some(etag) = validator.etag.as_deref() {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = validator.last_modified.as_deref() {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url = %target, error = %err, "calendar fetch failed");
                return FetchOutcome::failed(describe_error(&err));
            }
        };

        let status = response.status();
        debug!(url = %target, %status, "calendar fetch response");
        match status {
            StatusCode::OK => {
                let validator = Validator::new(
                    header_string(response.headers(), ETAG),
                    header_string(response.headers(), LAST_MODIFIED),
                );
                match response.text().await {
                    Ok(content) => FetchOutcome::Fresh { content, validator },
                    Err(err) => {
                        FetchOutcome::failed(format!("reading body: {}", describe_error(&err)))
                    }
                }
            }
            StatusCode::NOT_MODIFIED => FetchOutcome::NotModified,
            other => FetchOutcome::failed(format!("unexpected status {other}")),
        }
    }
}

/// Rewrite `webcal://` and `webcals://` subscription links to `https://`
pub fn normalize_url(url: &str) -> Cow<'_, str> {
    for scheme in ["webcals://", "webcal://"] {
        let matches = url
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme));
        if matches {
            return Cow::Owned(format!("https://{}", &url[scheme.len()..]));
        }
    }
    Cow::Borrowed(url)
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn describe_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}
