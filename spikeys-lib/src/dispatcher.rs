//! The bounded concurrent request dispatcher.
//!
//! A [`Dispatcher`] sends `request_count` requests through a
//! [`RequestPerformer`], keeping at most `max_concurrency` of them in flight.
//! Two nested [`CancelScope`]s bound the run:
//!
//! - the benchmark scope, expiring `benchmark_timeout` after dispatch starts,
//! - one request scope per request, derived from the benchmark scope and
//!   expiring `request_timeout` after that request was submitted.
//!
//! Ordinary request failures are recorded and the run goes on. A request
//! exceeding its own deadline is escalated instead: it cancels the benchmark
//! scope and the run ends with [`ErrorKind::RequestTimeoutExceeded`]. When
//! the benchmark scope expires first, the run ends with
//! [`ErrorKind::BenchmarkTimeoutExceeded`]. An aborted run never yields a
//! partial [`RunResult`].
//!
//! Escalating a single slow request into an abort of the whole run is a
//! deliberate choice: once the per-request budget proved unworkable, the
//! remaining measurements are not meaningful.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use url::Url;

use crate::slots::ResultSlots;
use crate::{
    BenchmarkConfig, CancelScope, ErrorKind, RequestOutcome, RequestPerformer, Result, RunResult,
};

/// Runs one benchmark.
///
/// A dispatcher holds all state of a single run and is consumed by
/// [`Dispatcher::run`]; nothing survives between runs.
pub struct Dispatcher<P> {
    config: BenchmarkConfig,
    performer: Arc<P>,
    /// Admission control for in-flight requests
    gate: Arc<Semaphore>,
    /// Set by the first request which exceeded its own deadline
    escalated: Arc<AtomicBool>,
    slots: ResultSlots,
}

impl<P> Dispatcher<P>
where
    P: RequestPerformer + 'static,
{
    /// Create a dispatcher for a single run of `config`
    #[must_use]
    pub fn new(config: BenchmarkConfig, performer: P) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(config.max_concurrency())),
            escalated: Arc::new(AtomicBool::new(false)),
            slots: ResultSlots::new(config.request_count()),
            performer: Arc::new(performer),
            config,
        }
    }

    /// Send all requests and wait for them to finish.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::RequestTimeoutExceeded`] if any request exceeded the
    ///   request timeout
    /// - [`ErrorKind::BenchmarkTimeoutExceeded`] if the benchmark timeout
    ///   elapsed before all requests finished
    /// - [`ErrorKind::TaskFailed`] if a request task panicked
    pub async fn run(self) -> Result<RunResult> {
        let Self {
            config,
            performer,
            gate,
            escalated,
            mut slots,
        } = self;

        let url = Arc::new(config.url().clone());
        let benchmark = CancelScope::with_timeout(config.benchmark_timeout());
        let start = Instant::now();
        let mut expired = false;
        let mut units = JoinSet::new();

        info!(
            "Sending {} requests to {url} ({} at a time)",
            config.request_count(),
            config.max_concurrency()
        );

        for index in 0..config.request_count() {
            let permit = tokio::select! {
                biased;
                () = benchmark.cancelled() => None,
                () = benchmark.expired() => {
                    expired = true;
                    None
                }
                permit = Arc::clone(&gate).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                debug!("Stopped submitting after {index} requests");
                break;
            };

            debug!("Submitting request #{index}");
            let unit = Unit {
                index,
                scope: benchmark.child(config.request_timeout()),
                benchmark: benchmark.clone(),
                escalated: Arc::clone(&escalated),
                permit,
            };
            units.spawn(unit.execute(Arc::clone(&performer), Arc::clone(&url)));
        }

        if expired {
            warn!("Benchmark timeout elapsed while waiting for a free slot");
            benchmark.cancel();
        }

        let mut failure = None;
        loop {
            tokio::select! {
                () = benchmark.expired(), if !benchmark.is_cancelled() => {
                    warn!("Benchmark timeout elapsed with requests still in flight");
                    expired = true;
                    benchmark.cancel();
                }
                joined = units.join_next() => match joined {
                    Some(Ok((index, outcome))) => {
                        if let Err(e) = slots.fill(index, outcome) {
                            failure.get_or_insert(e);
                        }
                    }
                    Some(Err(e)) => {
                        failure.get_or_insert(ErrorKind::TaskFailed(e));
                    }
                    None => break,
                },
            }
        }
        let duration = start.elapsed();

        if escalated.load(Ordering::SeqCst) {
            return Err(ErrorKind::RequestTimeoutExceeded);
        }
        if expired {
            return Err(ErrorKind::BenchmarkTimeoutExceeded);
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let outcomes = slots.into_outcomes()?;
        info!("Finished {} requests in {duration:?}", outcomes.len());
        Ok(RunResult { outcomes, duration })
    }
}

/// A single submitted request
struct Unit {
    index: usize,
    scope: CancelScope,
    benchmark: CancelScope,
    escalated: Arc<AtomicBool>,
    permit: OwnedSemaphorePermit,
}

impl Unit {
    async fn execute<P>(self, performer: Arc<P>, url: Arc<Url>) -> (usize, RequestOutcome)
    where
        P: RequestPerformer + ?Sized,
    {
        let Self {
            index,
            scope,
            benchmark,
            escalated,
            permit,
        } = self;

        let outcome = performer.perform(&scope, &url).await;
        debug!("Request #{index} finished in {:?}", outcome.duration);

        // Cancel before the permit is released so the dispatch loop cannot
        // submit another request in between
        if outcome.is_deadline_exceeded() && !escalated.swap(true, Ordering::SeqCst) {
            warn!("Request #{index} exceeded the request timeout, aborting benchmark");
            benchmark.cancel();
        }
        drop(permit);

        (index, outcome)
    }
}
