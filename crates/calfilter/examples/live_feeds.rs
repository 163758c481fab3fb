//! Keep live filters warm and report their refresh status
//!
//! cargo run -p calfilter --example live_feeds --features tracing-metrics -- filters.json

use calfilter::TracingMetrics;
use calfilter::prelude::*;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: live_feeds <filters.json>")?;
    let store = MemoryFilterStore::from_json(&std::fs::read_to_string(path)?)?;

    let metrics = TracingMetrics::new().with_service_name("live-feeds");
    let sources = SourceCalendarCache::with_metrics(
        HttpFetcher::with_defaults()?,
        metrics,
        SourceCacheConfig::with_ttl(Duration::from_secs(300)),
    );
    let cache = FilteredCalendarCache::new(sources, IcsCodec::new());
    let scheduler = RefreshScheduler::with_config(
        cache,
        SchedulerConfig {
            default_interval: Duration::from_secs(60),
            ..SchedulerConfig::default()
        },
    );

    let registered = scheduler.register_live(&store).await?;
    println!("refreshing {registered} live filters");
    scheduler.start()?;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(30)).await;
        for id in scheduler.registered() {
            if let Some(status) = scheduler.status(&id) {
                println!(
                    "{id}: {:?} ticks={} failures={} last_error={:?}",
                    status.state, status.ticks, status.failures, status.last_error
                );
            }
        }
        let stats = scheduler.cache().sources().stats();
        println!(
            "source cache: {} entries, {} fetches, {} not modified, {} stale",
            stats.size, stats.fetches, stats.not_modified, stats.stale_hits
        );
    }

    scheduler.stop().await?;
    Ok(())
}
