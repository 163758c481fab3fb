//! Periodic forced refresh of registered filters
//!
//! Each registered filter gets its own task ticking on the filter's
//! interval. A tick calls
//! [`get_filtered_content`](crate::FilteredCalendarCache::get_filtered_content)
//! with `force_refresh`, so the source is revalidated upstream and the
//! output rebuilt. Ticks share a worker pool. A tick that fails or panics
//! is recorded in that filter's status and retried on the next interval.

use dashmap::DashMap;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use calfilter_core::{
    CacheMetrics, CacheOperation, CalendarCodec, CalendarError, Fetcher, FilterId, FilterSpec,
    FilterStore, NoopMetrics, Result,
};
use calfilter_http::HttpFetcher;

use crate::codec::IcsCodec;
use crate::filtered::FilteredCalendarCache;

/// Configuration for RefreshScheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Refreshes allowed to run at once
    pub workers: usize,
    /// Interval for filters registered from a store
    pub default_interval: Duration,
    /// Bound on waiting for tasks in `stop`
    pub stop_timeout: Duration,
    /// Random delay before a task's first tick, as a fraction of its
    /// interval (0.0 - 1.0)
    pub start_jitter: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            default_interval: Duration::from_secs(30 * 60),
            stop_timeout: Duration::from_secs(10),
            start_jitter: 0.1,
        }
    }
}

impl SchedulerConfig {
    /// Create config with a specific worker count
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Disable start jitter
    pub fn no_jitter(mut self) -> Self {
        self.start_jitter = 0.0;
        self
    }
}

/// Where a filter's task is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for the next tick
    Scheduled,
    /// Refresh in progress
    Running,
    /// Last refresh failed; retried on the next tick
    Failed,
}

/// Observable state of one filter's refresh task
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub state: TaskState,
    pub interval: Duration,
    /// Completed refreshes, failed ones included
    pub ticks: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_run_at: Option<SystemTime>,
}

impl TaskStatus {
    fn new(interval: Duration) -> Self {
        Self {
            state: TaskState::Scheduled,
            interval,
            ticks: 0,
            failures: 0,
            last_error: None,
            last_run_at: None,
        }
    }
}

/// Status of one registration; a replaced registration keeps its own
type StatusCell = Arc<Mutex<TaskStatus>>;

struct Task {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Registration {
    spec: FilterSpec,
    interval: Duration,
    status: StatusCell,
    task: Option<Task>,
}

struct Running {
    cancel: CancellationToken,
    workers: Arc<Semaphore>,
    runtime: Handle,
}

#[derive(Default)]
struct Inner {
    registrations: HashMap<FilterId, Registration>,
    running: Option<Running>,
    /// Cancelled tasks of replaced or unregistered filters, joined by `stop`
    retired: Vec<JoinHandle<()>>,
}

impl Inner {
    fn retire(&mut self, task: Task) {
        task.cancel.cancel();
        self.retired.retain(|handle| !handle.is_finished());
        self.retired.push(task.handle);
    }
}

/// Refreshes registered filters in the background
///
/// Filters may be registered and unregistered at any time; while the
/// scheduler runs, a registration starts its task immediately.
pub struct RefreshScheduler<F = HttpFetcher, C = IcsCodec, M = NoopMetrics>
where
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    cache: FilteredCalendarCache<F, C, M>,
    config: SchedulerConfig,
    inner: Mutex<Inner>,
    statuses: DashMap<FilterId, StatusCell>,
}

impl<F, C, M> RefreshScheduler<F, C, M>
where
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    /// Create a scheduler with default config
    pub fn new(cache: FilteredCalendarCache<F, C, M>) -> Self {
        Self::with_config(cache, SchedulerConfig::default())
    }

    /// Create with custom config
    pub fn with_config(cache: FilteredCalendarCache<F, C, M>, config: SchedulerConfig) -> Self {
        Self {
            cache,
            config,
            inner: Mutex::new(Inner::default()),
            statuses: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &FilteredCalendarCache<F, C, M> {
        &self.cache
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Refresh `spec` every `interval`
    ///
    /// Re-registering an id replaces its spec, interval and status. A
    /// refresh still running for the old registration finishes without
    /// touching the new status.
    pub fn register_filter(&self, spec: FilterSpec, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(CalendarError::Config(format!(
                "refresh interval for {} must be positive",
                spec.id()
            )));
        }

        let id = spec.id().clone();
        let mut inner = self.inner.lock();
        if let Some(Registration {
            task: Some(task), ..
        }) = inner.registrations.remove(&id)
        {
            inner.retire(task);
        }

        let status = Arc::new(Mutex::new(TaskStatus::new(interval)));
        self.statuses.insert(id.clone(), status.clone());
        let task = inner
            .running
            .as_ref()
            .map(|running| self.spawn_task(spec.clone(), interval, &status, running));
        inner.registrations.insert(
            id.clone(),
            Registration {
                spec,
                interval,
                status,
                task,
            },
        );

        info!(filter_id = %id, interval_secs = interval.as_secs(), "filter registered for refresh");
        Ok(())
    }

    /// Register every live filter in `store` at the default interval
    ///
    /// Returns the number of filters registered.
    pub async fn register_live<S>(&self, store: &S) -> Result<usize>
    where
        S: FilterStore + ?Sized,
    {
        let records = store.live_filters().await?;
        let count = records.len();
        for record in records {
            self.register_filter(record.spec, self.config.default_interval)?;
        }
        Ok(count)
    }

    /// Stop refreshing a filter
    ///
    /// A refresh already in progress completes and is waited for by
    /// [`stop`](Self::stop); no further ticks run. Cached output is left in
    /// place.
    pub fn unregister_filter(&self, id: &FilterId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.registrations.remove(id);
        self.statuses.remove(id);
        match removed {
            Some(registration) => {
                if let Some(task) = registration.task {
                    inner.retire(task);
                }
                info!(filter_id = %id, "filter unregistered from refresh");
                true
            }
            None => false,
        }
    }

    /// Start a task for every registered filter
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| CalendarError::Config(e.to_string()))?;
        let mut inner = self.inner.lock();
        if inner.running.is_some() {
            return Err(CalendarError::AlreadyRunning);
        }

        let workers = self.config.workers.max(1);
        let running = Running {
            cancel: CancellationToken::new(),
            workers: Arc::new(Semaphore::new(workers)),
            runtime,
        };
        for registration in inner.registrations.values_mut() {
            let task = self.spawn_task(
                registration.spec.clone(),
                registration.interval,
                &registration.status,
                &running,
            );
            registration.task = Some(task);
        }

        let filters = inner.registrations.len();
        inner.running = Some(running);
        info!(filters, workers, "refresh scheduler started");
        Ok(())
    }

    /// Cancel every task and wait for in-progress refreshes
    ///
    /// Tasks still running after `stop_timeout` are aborted and
    /// [`CalendarError::Timeout`] is returned. The scheduler can be
    /// started again afterwards.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut handles: Vec<JoinHandle<()>> = {
            let mut inner = self.inner.lock();
            let running = inner.running.take().ok_or(CalendarError::NotRunning)?;
            running.cancel.cancel();
            running.workers.close();
            let mut handles: Vec<JoinHandle<()>> = inner
                .registrations
                .values_mut()
                .filter_map(|registration| registration.task.take())
                .map(|task| task.handle)
                .collect();
            handles.append(&mut inner.retired);
            handles
        };

        let stop_timeout = self.config.stop_timeout;
        let joined = tokio::time::timeout(stop_timeout, async {
            for handle in handles.iter_mut() {
                if let Err(err) = handle.await {
                    if err.is_panic() {
                        warn!(error = %err, "refresh task panicked");
                    }
                }
            }
        })
        .await;

        for cell in self.statuses.iter() {
            let mut status = cell.lock();
            if status.state == TaskState::Running {
                status.state = TaskState::Scheduled;
            }
        }

        match joined {
            Ok(()) => {
                info!("refresh scheduler stopped");
                Ok(())
            }
            Err(_) => {
                for handle in &handles {
                    handle.abort();
                }
                warn!(
                    timeout_secs = stop_timeout.as_secs(),
                    "refresh tasks did not stop in time, aborted"
                );
                Err(CalendarError::Timeout)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running.is_some()
    }

    /// Current status of a registered filter's task
    pub fn status(&self, id: &FilterId) -> Option<TaskStatus> {
        self.statuses.get(id).map(|cell| cell.lock().clone())
    }

    /// Registered filter ids, sorted
    pub fn registered(&self) -> Vec<FilterId> {
        let mut ids: Vec<FilterId> = self.inner.lock().registrations.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn spawn_task(
        &self,
        spec: FilterSpec,
        interval: Duration,
        status: &StatusCell,
        running: &Running,
    ) -> Task {
        let cancel = running.cancel.child_token();
        let worker = RefreshWorker {
            cache: self.cache.clone(),
            status: status.clone(),
            workers: running.workers.clone(),
            cancel: cancel.clone(),
        };
        let delay = self.first_tick_delay(interval);
        let handle = running.runtime.spawn(worker.run(spec, interval, delay));
        Task { cancel, handle }
    }

    /// Spread first ticks so filters registered together do not fire together
    fn first_tick_delay(&self, interval: Duration) -> Duration {
        if self.config.start_jitter > 0.0 {
            let jitter = self.config.start_jitter.min(1.0);
            let range_ms = (interval.as_secs_f64() * 1000.0 * jitter) as u64;
            if range_ms > 0 {
                return Duration::from_millis(rand::random::<u64>() % range_ms);
            }
        }
        Duration::ZERO
    }
}

impl<F, C, M> Drop for RefreshScheduler<F, C, M>
where
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    fn drop(&mut self) {
        if let Some(running) = self.inner.get_mut().running.take() {
            warn!("RefreshScheduler dropped while running; cancelling tasks");
            running.cancel.cancel();
        }
    }
}

struct RefreshWorker<F, C, M>
where
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    cache: FilteredCalendarCache<F, C, M>,
    status: StatusCell,
    workers: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl<F, C, M> RefreshWorker<F, C, M>
where
    F: Fetcher,
    C: CalendarCodec,
    M: CacheMetrics,
{
    async fn run(self, spec: FilterSpec, interval: Duration, delay: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + delay, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = self.workers.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            self.refresh(&spec).await;
            drop(permit);
        }

        debug!(filter_id = %spec.id(), "refresh task exited");
    }

    async fn refresh(&self, spec: &FilterSpec) {
        let id = spec.id();
        self.update(|status| status.state = TaskState::Running);

        let start = Instant::now();
        let result = AssertUnwindSafe(self.cache.get_filtered_content(spec, true))
            .catch_unwind()
            .await;
        let metrics = self.cache.metrics();
        metrics.record_latency(CacheOperation::Refresh, start.elapsed());

        let message = match result {
            Ok(Ok(content)) => {
                debug!(filter_id = %id, bytes = content.len(), "filter refreshed");
                self.update(|status| {
                    status.state = TaskState::Scheduled;
                    status.ticks += 1;
                    status.last_error = None;
                    status.last_run_at = Some(SystemTime::now());
                });
                return;
            }
            Ok(Err(err)) => {
                warn!(filter_id = %id, error = %err, "scheduled refresh failed");
                err.to_string()
            }
            Err(panic) => {
                let message = format!("refresh panicked: {}", panic_message(&*panic));
                error!(filter_id = %id, error = %message, "scheduled refresh panicked");
                message
            }
        };

        metrics.record_refresh_failure(id.as_str());
        self.update(move |status| {
            status.state = TaskState::Failed;
            status.ticks += 1;
            status.failures += 1;
            status.last_error = Some(message);
            status.last_run_at = Some(SystemTime::now());
        });
    }

    fn update(&self, apply: impl FnOnce(&mut TaskStatus)) {
        apply(&mut *self.status.lock());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceCalendarCache;
    use crate::testing::{ScriptedFetcher, calendar, fresh};
    use async_trait::async_trait;
    use calfilter_core::{Event, FetchOutcome, FilterRecord, Validator};
    use calfilter_storage::MemoryFilterStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const GOOD: &str = "https://example.com/good.ics";
    const BAD: &str = "https://example.com/bad.ics";
    const MINUTE: Duration = Duration::from_secs(60);

    fn scheduler<F: Fetcher>(fetcher: F, config: SchedulerConfig) -> RefreshScheduler<F> {
        let cache = FilteredCalendarCache::new(SourceCalendarCache::new(fetcher), IcsCodec::new());
        RefreshScheduler::with_config(cache, config)
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            stop_timeout: Duration::from_secs(5),
            ..SchedulerConfig::default()
        }
        .no_jitter()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_interval() {
        let fetcher = ScriptedFetcher::new();
        fetcher.push(GOOD, fresh(&calendar(&[("1", "A")]), Some("\"v1\"")));
        fetcher.always(GOOD, FetchOutcome::NotModified);
        let scheduler = scheduler(fetcher.clone(), config());
        let spec = FilterSpec::new("good", GOOD, ["A"]);

        scheduler.register_filter(spec.clone(), MINUTE).unwrap();
        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(150)).await;

        // Ticks at 0s, 60s and 120s, each a forced conditional fetch
        let calls = fetcher.calls(GOOD);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Validator::default());
        assert_eq!(calls[2], Validator::etag("\"v1\""));

        let status = scheduler.status(spec.id()).unwrap();
        assert_eq!(status.state, TaskState::Scheduled);
        assert_eq!(status.ticks, 3);
        assert_eq!(status.failures, 0);
        assert!(scheduler.cache().entry(spec.id()).await.is_some());

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(fetcher.call_count(GOOD), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_filter_does_not_affect_others() {
        let fetcher = ScriptedFetcher::new();
        fetcher.always(GOOD, fresh(&calendar(&[("1", "A")]), None));
        fetcher.always(BAD, FetchOutcome::failed("unexpected status 500"));
        let scheduler = scheduler(fetcher.clone(), config());

        let good = FilterSpec::new("good", GOOD, ["A"]);
        let bad = FilterSpec::new("bad", BAD, ["A"]);
        scheduler.register_filter(good.clone(), MINUTE).unwrap();
        scheduler.register_filter(bad.clone(), MINUTE).unwrap();
        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(150)).await;

        let good_status = scheduler.status(good.id()).unwrap();
        assert_eq!(good_status.ticks, 3);
        assert_eq!(good_status.failures, 0);

        let bad_status = scheduler.status(bad.id()).unwrap();
        assert_eq!(bad_status.state, TaskState::Failed);
        assert_eq!(bad_status.ticks, 3);
        assert_eq!(bad_status.failures, 3);
        assert!(bad_status.last_error.unwrap().contains("unexpected status 500"));

        scheduler.stop().await.unwrap();
    }

    /// Codec whose first parse panics
    #[derive(Default)]
    struct PanicOnceCodec {
        inner: IcsCodec,
        panicked: AtomicBool,
    }

    impl CalendarCodec for PanicOnceCodec {
        fn parse_events(&self, text: &str) -> Result<Vec<Event>> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("codec bug");
            }
            self.inner.parse_events(text)
        }

        fn serialize_events(&self, events: &[Event]) -> Result<String> {
            self.inner.serialize_events(events)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_refresh_is_retried() {
        let fetcher = ScriptedFetcher::new();
        fetcher.always(GOOD, fresh(&calendar(&[("1", "A")]), None));
        let cache = FilteredCalendarCache::new(
            SourceCalendarCache::new(fetcher.clone()),
            PanicOnceCodec::default(),
        );
        let scheduler = RefreshScheduler::with_config(cache, config());
        let spec = FilterSpec::new("good", GOOD, ["A"]);

        scheduler.register_filter(spec.clone(), MINUTE).unwrap();
        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let status = scheduler.status(spec.id()).unwrap();
        assert_eq!(status.state, TaskState::Failed);
        assert_eq!(status.ticks, 1);
        assert!(status.last_error.unwrap().contains("codec bug"));
        assert!(scheduler.cache().entry(spec.id()).await.is_none());

        // Ticks at 60s and 120s still run
        tokio::time::sleep(Duration::from_secs(120)).await;
        let status = scheduler.status(spec.id()).unwrap();
        assert_eq!(status.state, TaskState::Scheduled);
        assert_eq!(status.ticks, 3);
        assert_eq!(status.failures, 1);
        assert!(status.last_error.is_none());
        assert_eq!(fetcher.call_count(GOOD), 3);
        assert!(scheduler.cache().entry(spec.id()).await.is_some());

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_and_unregister_while_running() {
        let fetcher = ScriptedFetcher::new();
        fetcher.always(GOOD, fresh(&calendar(&[("1", "A")]), None));
        let scheduler = scheduler(fetcher.clone(), config());
        let spec = FilterSpec::new("good", GOOD, ["A"]);

        scheduler.start().unwrap();
        scheduler.register_filter(spec.clone(), MINUTE).unwrap();
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(fetcher.call_count(GOOD), 2);

        assert!(scheduler.unregister_filter(spec.id()));
        assert!(!scheduler.unregister_filter(spec.id()));
        assert!(scheduler.status(spec.id()).is_none());
        assert!(scheduler.registered().is_empty());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(fetcher.call_count(GOOD), 2);
        // Unregistering leaves cached output in place
        assert!(scheduler.cache().entry(spec.id()).await.is_some());

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregister_replaces_interval() {
        let fetcher = ScriptedFetcher::new();
        fetcher.always(GOOD, fresh(&calendar(&[("1", "A")]), None));
        let scheduler = scheduler(fetcher.clone(), config());
        let spec = FilterSpec::new("good", GOOD, ["A"]);

        scheduler.start().unwrap();
        scheduler.register_filter(spec.clone(), MINUTE).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        scheduler
            .register_filter(spec.clone(), Duration::from_secs(600))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;

        // One tick from each registration; the old 60s task is gone
        assert_eq!(fetcher.call_count(GOOD), 2);
        assert_eq!(scheduler.registered(), vec![spec.id().clone()]);
        assert_eq!(
            scheduler.status(spec.id()).unwrap().interval,
            Duration::from_secs(600)
        );

        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let scheduler = scheduler(ScriptedFetcher::new(), config());

        assert!(matches!(
            scheduler.stop().await,
            Err(CalendarError::NotRunning)
        ));
        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(CalendarError::AlreadyRunning)));
        scheduler.stop().await.unwrap();

        // Restart after stop
        scheduler.start().unwrap();
        scheduler.stop().await.unwrap();
    }

    #[test]
    fn test_start_requires_runtime() {
        let scheduler = scheduler(ScriptedFetcher::new(), config());
        assert!(matches!(scheduler.start(), Err(CalendarError::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let scheduler = scheduler(ScriptedFetcher::new(), config());
        let err = scheduler
            .register_filter(FilterSpec::new("f", GOOD, ["A"]), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, CalendarError::Config(_)));
        assert!(scheduler.registered().is_empty());
    }

    #[tokio::test]
    async fn test_register_live() {
        let store = MemoryFilterStore::from_records([
            FilterRecord::new(FilterSpec::new("a", GOOD, ["A"]), "A").live(),
            FilterRecord::new(FilterSpec::new("b", GOOD, ["B"]), "B"),
            FilterRecord::new(FilterSpec::new("c", BAD, ["C"]), "C").live(),
        ]);
        let scheduler = scheduler(ScriptedFetcher::new(), config());

        assert_eq!(scheduler.register_live(&store).await.unwrap(), 2);
        assert_eq!(
            scheduler.registered(),
            vec![FilterId::new("a"), FilterId::new("c")]
        );
        let status = scheduler.status(&FilterId::new("a")).unwrap();
        assert_eq!(status.interval, SchedulerConfig::default().default_interval);
        assert_eq!(status.state, TaskState::Scheduled);
    }

    #[test]
    fn test_first_tick_delay_within_jitter() {
        let jittered = scheduler(ScriptedFetcher::new(), SchedulerConfig::default());
        for _ in 0..100 {
            assert!(jittered.first_tick_delay(Duration::from_secs(600)) < MINUTE);
        }

        let steady = scheduler(ScriptedFetcher::new(), config());
        assert_eq!(steady.first_tick_delay(MINUTE), Duration::ZERO);
    }

    /// Fetcher that holds each request for a while and tracks concurrency
    #[derive(Default)]
    struct SlowFetcher {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for SlowFetcher {
        async fn fetch(&self, _url: &str, _validator: &Validator) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            fresh(&calendar(&[("1", "A")]), None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_pool_bounds_concurrency() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(5),
            ..SlowFetcher::default()
        });
        let scheduler = scheduler(SharedFetcher(fetcher.clone()), config());

        for i in 0..4 {
            let spec = FilterSpec::new(format!("f{i}"), format!("https://example.com/{i}.ics"), ["A"]);
            scheduler.register_filter(spec, MINUTE).unwrap();
        }
        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_times_out_on_stuck_refresh() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(3600),
            ..SlowFetcher::default()
        });
        let config = SchedulerConfig {
            stop_timeout: Duration::from_secs(1),
            ..config()
        };
        let scheduler = scheduler(SharedFetcher(fetcher.clone()), config);

        scheduler
            .register_filter(FilterSpec::new("f", GOOD, ["A"]), MINUTE)
            .unwrap();
        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        assert!(matches!(scheduler.stop().await, Err(CalendarError::Timeout)));
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_registration_keeps_its_own_status() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(30),
            ..SlowFetcher::default()
        });
        let scheduler = scheduler(SharedFetcher(fetcher.clone()), config());
        let spec = FilterSpec::new("f", GOOD, ["A"]);

        scheduler.start().unwrap();
        scheduler.register_filter(spec.clone(), MINUTE).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        scheduler
            .register_filter(spec.clone(), Duration::from_secs(600))
            .unwrap();

        // The old refresh ends at 30s; the new one then holds the filter
        tokio::time::sleep(Duration::from_secs(25)).await;
        let status = scheduler.status(spec.id()).unwrap();
        assert_eq!(status.state, TaskState::Running);
        assert_eq!(status.ticks, 0);

        tokio::time::sleep(Duration::from_secs(35)).await;
        let status = scheduler.status(spec.id()).unwrap();
        assert_eq!(status.state, TaskState::Scheduled);
        assert_eq!(status.ticks, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_unregistered_refresh() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(30),
            ..SlowFetcher::default()
        });
        let config = SchedulerConfig {
            stop_timeout: MINUTE,
            ..config()
        };
        let scheduler = scheduler(SharedFetcher(fetcher.clone()), config);
        let spec = FilterSpec::new("f", GOOD, ["A"]);

        scheduler.start().unwrap();
        scheduler.register_filter(spec.clone(), MINUTE).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 1);

        assert!(scheduler.unregister_filter(spec.id()));
        scheduler.stop().await.unwrap();

        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
        assert!(scheduler.cache().entry(spec.id()).await.is_some());
    }

    struct SharedFetcher(Arc<SlowFetcher>);

    #[async_trait]
    impl Fetcher for SharedFetcher {
        async fn fetch(&self, url: &str, validator: &Validator) -> FetchOutcome {
            self.0.fetch(url, validator).await
        }
    }
}
