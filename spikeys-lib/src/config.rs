use std::time::Duration;

use url::Url;

use crate::{ErrorKind, Result};

/// Default number of requests to send, 1.
pub const DEFAULT_REQUEST_COUNT: usize = 1;
/// Default number of requests in flight at once, 1.
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;
/// Default wall-clock budget of a whole benchmark in seconds, 30.
pub const DEFAULT_BENCHMARK_TIMEOUT_SECS: u64 = 30;
/// Default time budget of a single request in seconds, 5.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// A validated benchmark configuration.
///
/// The only way to create one is [`BenchmarkConfig::new`], so every value of
/// this type has a positive request count, concurrency and timeouts, and an
/// absolute `http(s)` URL with a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkConfig {
    request_count: usize,
    max_concurrency: usize,
    request_timeout: Duration,
    benchmark_timeout: Duration,
    url: Url,
}

impl BenchmarkConfig {
    /// Validate the given values and create a configuration from them
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute `http(s)` URL with a host,
    /// or if any of the counts or timeouts is zero.
    pub fn new(
        url: &str,
        request_count: usize,
        max_concurrency: usize,
        request_timeout: Duration,
        benchmark_timeout: Duration,
    ) -> Result<Self> {
        let url = parse_target(url)?;
        if request_count == 0 {
            return Err(ErrorKind::InvalidRequestCount);
        }
        if max_concurrency == 0 {
            return Err(ErrorKind::InvalidConcurrency);
        }
        if request_timeout.is_zero() {
            return Err(ErrorKind::InvalidRequestTimeout);
        }
        if benchmark_timeout.is_zero() {
            return Err(ErrorKind::InvalidBenchmarkTimeout);
        }

        Ok(Self {
            request_count,
            max_concurrency,
            request_timeout,
            benchmark_timeout,
            url,
        })
    }

    /// Number of requests to send
    #[must_use]
    pub const fn request_count(&self) -> usize {
        self.request_count
    }

    /// Maximum number of requests in flight at once
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Time budget of a single request
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Wall-clock budget of the whole run
    #[must_use]
    pub const fn benchmark_timeout(&self) -> Duration {
        self.benchmark_timeout
    }

    /// The URL every request is sent to
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

fn parse_target(input: &str) -> Result<Url> {
    let invalid = || ErrorKind::InvalidUrl(input.to_string());
    let url = Url::parse(input).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(invalid());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_valid_config() {
        let config = BenchmarkConfig::new(
            "https://example.com",
            50,
            5,
            Duration::from_secs(10),
            Duration::from_secs(120),
        )
        .unwrap();

        assert_eq!(config.url().as_str(), "https://example.com/");
        assert_eq!(config.request_count(), 50);
        assert_eq!(config.max_concurrency(), 5);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.benchmark_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_values() {
        let url = "https://example.com";
        let cases = [
            (BenchmarkConfig::new(url, 0, 1, SECOND, SECOND), "invalid request count"),
            (BenchmarkConfig::new(url, 1, 0, SECOND, SECOND), "invalid concurrency"),
            (
                BenchmarkConfig::new(url, 1, 1, Duration::ZERO, SECOND),
                "invalid request timeout",
            ),
            (
                BenchmarkConfig::new(url, 1, 1, SECOND, Duration::ZERO),
                "invalid benchmark timeout",
            ),
        ];
        for (result, expected) in cases {
            let err = result.unwrap_err();
            assert!(err.is_config_error());
            assert!(err.to_string().starts_with(expected), "{err}");
        }
    }

    #[test]
    fn test_invalid_urls() {
        for url in ["", "example.com", "/relative/path", "ftp://example.com", "http://", "mailto:a@b.c"] {
            let err = BenchmarkConfig::new(url, 1, 1, SECOND, SECOND).unwrap_err();
            assert!(matches!(err, ErrorKind::InvalidUrl(ref u) if u == url), "{url}");
        }
    }

    #[test]
    fn test_url_is_checked_first() {
        let err = BenchmarkConfig::new("nope", 0, 0, Duration::ZERO, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidUrl(_)));
    }
}
