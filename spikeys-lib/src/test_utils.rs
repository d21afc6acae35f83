use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use http::StatusCode;
use url::Url;

use crate::{BenchmarkConfig, CancelScope, RequestOutcome, RequestPerformer};

/// Create a valid configuration
///
/// # Panic
///
/// This panics on invalid values, so it should only be used for testing
pub(crate) fn config(
    url: &str,
    request_count: usize,
    max_concurrency: usize,
    request_timeout: Duration,
    benchmark_timeout: Duration,
) -> BenchmarkConfig {
    BenchmarkConfig::new(
        url,
        request_count,
        max_concurrency,
        request_timeout,
        benchmark_timeout,
    )
    .expect("Expected valid benchmark config")
}

/// Answers every request immediately with whatever `respond` returns, without
/// any network I/O
pub(crate) struct StubPerformer<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> StubPerformer<F>
where
    F: Fn() -> RequestOutcome + Send + Sync,
{
    pub(crate) const fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> RequestPerformer for StubPerformer<F>
where
    F: Fn() -> RequestOutcome + Send + Sync,
{
    async fn perform(&self, _scope: &CancelScope, _url: &Url) -> RequestOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)()
    }
}

/// Sleeps for `delay` within the given scope and records how many calls
/// were running at the same time
pub(crate) struct TrackingPerformer {
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    high_water_mark: AtomicUsize,
}

impl TrackingPerformer {
    pub(crate) const fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            high_water_mark: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn high_water_mark(&self) -> usize {
        self.high_water_mark.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestPerformer for TrackingPerformer {
    async fn perform(&self, scope: &CancelScope, _url: &Url) -> RequestOutcome {
        let start = Instant::now();
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water_mark.fetch_max(running, Ordering::SeqCst);

        let result = scope.guard(tokio::time::sleep(self.delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(()) => RequestOutcome::success(start.elapsed(), StatusCode::OK, 0),
            Err(e) => RequestOutcome::failure(start.elapsed(), e.into()),
        }
    }
}

/// The `n`-th call sleeps the longer the earlier it came, so calls finish in
/// reverse order. Each outcome reports its call number as `bytes`.
pub(crate) struct StaggeredPerformer {
    total: u64,
    step: Duration,
    calls: AtomicUsize,
}

impl StaggeredPerformer {
    pub(crate) const fn new(total: u64, step: Duration) -> Self {
        Self {
            total,
            step,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RequestPerformer for StaggeredPerformer {
    async fn perform(&self, scope: &CancelScope, _url: &Url) -> RequestOutcome {
        let start = Instant::now();
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
        let delay = self.step * u32::try_from(self.total.saturating_sub(call)).unwrap_or(0);

        match scope.guard(tokio::time::sleep(delay)).await {
            Ok(()) => RequestOutcome::success(start.elapsed(), StatusCode::OK, call),
            Err(e) => RequestOutcome::failure(start.elapsed(), e.into()),
        }
    }
}
