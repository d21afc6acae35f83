use http::StatusCode;
use thiserror::Error;

use crate::ScopeError;

/// Possible errors when interacting with `spikeys_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The given string is not an absolute `http(s)` URL with a host
    #[error("invalid url value: {0}")]
    InvalidUrl(String),
    /// The number of requests to send was zero
    #[error("invalid request count: must be greater than 0")]
    InvalidRequestCount,
    /// The number of parallel requests was zero
    #[error("invalid concurrency: must be greater than 0")]
    InvalidConcurrency,
    /// The per-request timeout was zero
    #[error("invalid request timeout: must be greater than 0")]
    InvalidRequestTimeout,
    /// The whole-benchmark timeout was zero
    #[error("invalid benchmark timeout: must be greater than 0")]
    InvalidBenchmarkTimeout,
    /// A custom header could not be converted into a header value
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
    /// The underlying HTTP client could not be created
    #[error("Failed to build the HTTP client")]
    BuildRequestClient(#[source] reqwest::Error),
    /// A single request exceeded its own deadline, which aborts the whole run
    #[error("request timeout exceeded")]
    RequestTimeoutExceeded,
    /// The run did not finish within the benchmark timeout
    #[error("benchmark timeout exceeded")]
    BenchmarkTimeoutExceeded,
    /// A request task panicked or was aborted
    #[error("Request task failed")]
    TaskFailed(#[from] tokio::task::JoinError),
    /// A result slot was written twice
    #[error("Result slot {0} was filled twice")]
    DuplicateOutcome(usize),
    /// A result slot was still empty after the run completed
    #[error("Result slot {0} was never filled")]
    MissingOutcome(usize),
}

impl ErrorKind {
    /// Returns `true` if the error is one of the two timeout aborts of a run
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeoutExceeded | Self::BenchmarkTimeoutExceeded
        )
    }

    /// Returns `true` if the error was caused by an invalid configuration
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_)
                | Self::InvalidRequestCount
                | Self::InvalidConcurrency
                | Self::InvalidRequestTimeout
                | Self::InvalidBenchmarkTimeout
        )
    }
}

/// The reason a single request failed.
///
/// These errors are benchmark data: they get recorded in the request's
/// [`RequestOutcome`](crate::RequestOutcome) and never abort a run on their
/// own. Only [`RequestError::DeadlineExceeded`] is escalated by the
/// dispatcher.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RequestError {
    /// The request's own deadline elapsed before it completed
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    /// The surrounding benchmark was cancelled while the request was in flight
    #[error("request cancelled")]
    Cancelled,
    /// The server answered with a status outside of `2xx`
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(StatusCode),
    /// Connecting or sending the request failed
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    /// The response body could not be read to the end
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    /// Any other failure reported by a custom performer
    #[error("{0}")]
    Other(String),
}

impl RequestError {
    /// Returns `true` if the request ran out of its own time budget
    #[must_use]
    pub const fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}

impl From<ScopeError> for RequestError {
    fn from(e: ScopeError) -> Self {
        match e {
            ScopeError::DeadlineExceeded => Self::DeadlineExceeded,
            ScopeError::Cancelled => Self::Cancelled,
        }
    }
}
