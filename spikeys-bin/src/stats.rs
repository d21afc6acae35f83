use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};
use spikeys_lib::RunResult;

/// Aggregate numbers of a finished benchmark run
#[derive(Debug, Default, Serialize, PartialEq)]
pub(crate) struct BenchmarkStats {
    pub(crate) completed: usize,
    pub(crate) failed: usize,
    pub(crate) total_bytes: u64,
    pub(crate) concurrency: usize,
    #[serde(rename = "total_duration_secs", serialize_with = "as_secs")]
    pub(crate) total_duration: Duration,
    #[serde(rename = "mean_ms", serialize_with = "as_millis")]
    pub(crate) mean: Duration,
    #[serde(rename = "fastest_ms", serialize_with = "as_millis_opt")]
    pub(crate) fastest: Option<Duration>,
    #[serde(rename = "slowest_ms", serialize_with = "as_millis_opt")]
    pub(crate) slowest: Option<Duration>,
    pub(crate) requests_per_second: f64,
    /// Responses per HTTP status code, failed ones included
    pub(crate) status_codes: BTreeMap<u16, usize>,
}

impl BenchmarkStats {
    /// Reduce the outcomes of a run into summary statistics.
    ///
    /// Bytes and timings only take completed requests into account.
    pub(crate) fn from_run(run: &RunResult, concurrency: usize) -> Self {
        let mut stats = Self {
            concurrency,
            total_duration: run.duration,
            ..Self::default()
        };
        let mut total_time = Duration::ZERO;

        for outcome in &run.outcomes {
            if let Some(status) = outcome.status {
                *stats.status_codes.entry(status.as_u16()).or_default() += 1;
            }

            if !outcome.is_success() {
                stats.failed += 1;
                continue;
            }

            stats.completed += 1;
            stats.total_bytes += outcome.bytes;
            total_time += outcome.duration;
            let duration = outcome.duration;
            stats.fastest = Some(stats.fastest.map_or(duration, |d| d.min(duration)));
            stats.slowest = Some(stats.slowest.map_or(duration, |d| d.max(duration)));
        }

        if stats.completed > 0 {
            let completed = u32::try_from(stats.completed).unwrap_or(u32::MAX);
            stats.mean = total_time / completed;
        }

        let secs = run.duration.as_secs_f64();
        if secs > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let completed = stats.completed as f64;
            stats.requests_per_second = completed / secs;
        }

        stats
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

#[allow(clippy::ref_option)]
fn as_millis_opt<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(duration) => as_millis(duration, serializer),
        None => serializer.serialize_none(),
    }
}
