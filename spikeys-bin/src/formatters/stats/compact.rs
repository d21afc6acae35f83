use anyhow::Result;
use console::Style;
use std::fmt::{self, Display};
use std::time::Duration;

use crate::formatters::color::{BOLD_GREEN, BOLD_YELLOW, DIM, NORMAL, PINK, YELLOW, color};
use crate::stats::BenchmarkStats;

use super::StatsFormatter;

// Width of the key column, including the trailing colon
const KEY_WIDTH: usize = 25;

struct CompactBenchmarkStats<'a> {
    stats: &'a BenchmarkStats,
}

impl Display for CompactBenchmarkStats<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;

        writeln!(f)?;
        color!(f, BOLD_YELLOW, "{}\n", "Benchmark Results")?;
        color!(f, DIM, "{}\n", "-----------------")?;

        let failed_color: &Style = if stats.failed > 0 { &PINK } else { &NORMAL };

        write_stat(f, "Completed requests:", &BOLD_GREEN, stats.completed)?;
        write_stat(f, "Failed requests:", failed_color, stats.failed)?;
        write_stat(
            f,
            "Total transferred:",
            &NORMAL,
            format!("{} bytes", stats.total_bytes),
        )?;
        write_stat(f, "Concurrency level:", &NORMAL, stats.concurrency)?;
        write_stat(
            f,
            "Time taken for tests:",
            &NORMAL,
            format!("{:.3} seconds", stats.total_duration.as_secs_f64()),
        )?;
        write_stat(f, "Time per request (mean):", &NORMAL, millis(stats.mean))?;
        if let (Some(fastest), Some(slowest)) = (stats.fastest, stats.slowest) {
            write_stat(f, "Fastest request:", &NORMAL, millis(fastest))?;
            write_stat(f, "Slowest request:", &YELLOW, millis(slowest))?;
        }
        write_stat(
            f,
            "Requests per second:",
            &BOLD_GREEN,
            format!("{:.3} [#/sec]", stats.requests_per_second),
        )?;

        if !stats.status_codes.is_empty() {
            writeln!(f)?;
            for (code, count) in &stats.status_codes {
                write_stat(f, &format!("Status {code}:"), &NORMAL, count)?;
            }
        }

        Ok(())
    }
}

fn millis(duration: Duration) -> String {
    format!("{:.3} ms", duration.as_secs_f64() * 1000.0)
}

fn write_stat(f: &mut fmt::Formatter, key: &str, style: &Style, value: impl Display) -> fmt::Result {
    writeln!(f, "{key:<KEY_WIDTH$} {}", style.apply_to(value))
}

pub(crate) struct Compact;

impl Compact {
    pub(crate) const fn new() -> Self {
        Self {}
    }
}

impl StatsFormatter for Compact {
    fn format(&self, stats: &BenchmarkStats) -> Result<String> {
        Ok(CompactBenchmarkStats { stats }.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_formatter() {
        let stats = BenchmarkStats {
            completed: 9,
            failed: 1,
            total_bytes: 1300,
            concurrency: 3,
            total_duration: Duration::from_millis(1500),
            mean: Duration::from_micros(12_345),
            fastest: Some(Duration::from_millis(5)),
            slowest: Some(Duration::from_millis(40)),
            requests_per_second: 6.0,
            status_codes: BTreeMap::from([(200, 9), (503, 1)]),
        };

        let output = console::strip_ansi_codes(&Compact::new().format(&stats).unwrap()).to_string();

        assert!(output.contains("Benchmark Results\n-----------------\n"));
        assert!(output.contains("Completed requests:       9\n"));
        assert!(output.contains("Failed requests:          1\n"));
        assert!(output.contains("Total transferred:        1300 bytes\n"));
        assert!(output.contains("Concurrency level:        3\n"));
        assert!(output.contains("Time taken for tests:     1.500 seconds\n"));
        assert!(output.contains("Time per request (mean):  12.345 ms\n"));
        assert!(output.contains("Fastest request:          5.000 ms\n"));
        assert!(output.contains("Slowest request:          40.000 ms\n"));
        assert!(output.contains("Requests per second:      6.000 [#/sec]\n"));
        assert!(output.contains("Status 503:               1\n"));
    }

    #[test]
    fn test_no_completed_requests() {
        let output = Compact::new()
            .format(&BenchmarkStats::default())
            .unwrap();
        let output = console::strip_ansi_codes(&output).to_string();

        assert!(output.contains("Completed requests:       0\n"));
        assert!(!output.contains("Fastest request:"));
        assert!(!output.contains("Status"));
    }
}
