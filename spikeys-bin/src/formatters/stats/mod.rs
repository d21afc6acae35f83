mod compact;
mod json;

pub(crate) use compact::Compact;
pub(crate) use json::Json;

use crate::stats::BenchmarkStats;
use anyhow::Result;

pub(crate) trait StatsFormatter {
    /// Format the statistics of a finished run
    fn format(&self, stats: &BenchmarkStats) -> Result<String>;
}
