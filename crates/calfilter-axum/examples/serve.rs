//! Serve live filters as subscription feeds
//!
//! cargo run -p calfilter-axum --example serve -- filters.json
//! then subscribe to http://127.0.0.1:8080/feeds/<id>

use calfilter::prelude::*;
use calfilter_axum::{FeedState, feed_router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: serve <filters.json>")?;
    let store = Arc::new(MemoryFilterStore::from_json(&std::fs::read_to_string(path)?)?);

    let sources = SourceCalendarCache::new(HttpFetcher::with_defaults()?);
    let cache = FilteredCalendarCache::new(sources, IcsCodec::new());

    let scheduler = RefreshScheduler::new(cache.clone());
    scheduler.register_live(store.as_ref()).await?;
    scheduler.start()?;

    let app = feed_router(FeedState::with_shared_store(store, cache));
    let listener = TcpListener::bind("127.0.0.1:8080").await?;
    println!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    scheduler.stop().await?;
    Ok(())
}
