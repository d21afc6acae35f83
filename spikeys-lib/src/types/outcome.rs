use std::time::Duration;

use http::StatusCode;

use crate::RequestError;

/// The recorded result of one attempted request
#[derive(Debug)]
pub struct RequestOutcome {
    /// Wall time from sending the request until the body was read or the
    /// request failed
    pub duration: Duration,
    /// Size of the response body; always `0` for failed requests
    pub bytes: u64,
    /// Status code, if the server answered at all
    pub status: Option<StatusCode>,
    /// Why the request failed, if it did
    pub error: Option<RequestError>,
}

impl RequestOutcome {
    /// Create the outcome of a request which transferred `bytes` of body
    #[inline]
    #[must_use]
    pub const fn success(duration: Duration, status: StatusCode, bytes: u64) -> Self {
        Self {
            duration,
            bytes,
            status: Some(status),
            error: None,
        }
    }

    /// Create the outcome of a failed request
    #[inline]
    #[must_use]
    pub const fn failure(duration: Duration, error: RequestError) -> Self {
        Self {
            duration,
            bytes: 0,
            status: None,
            error: Some(error),
        }
    }

    /// Attach the status code of the response which led to this outcome
    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` if the request completed without error
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `true` if the request ran out of its own time budget
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(RequestError::is_deadline_exceeded)
    }
}

/// The outcome of a completed benchmark run
#[derive(Debug)]
pub struct RunResult {
    /// One outcome per request, ordered by request sequence number
    pub outcomes: Vec<RequestOutcome>,
    /// Elapsed time from the first submission until every request finished
    pub duration: Duration,
}

impl RunResult {
    /// Number of requests which completed without error
    #[must_use]
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of requests which failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.successful()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_transfers_no_bytes() {
        let outcome = RequestOutcome::failure(
            Duration::from_millis(3),
            RequestError::UnexpectedStatus(StatusCode::BAD_GATEWAY),
        )
        .with_status(StatusCode::BAD_GATEWAY);

        assert_eq!(outcome.bytes, 0);
        assert_eq!(outcome.status, Some(StatusCode::BAD_GATEWAY));
        assert!(!outcome.is_success());
        assert!(!outcome.is_deadline_exceeded());
    }

    #[test]
    fn test_deadline_exceeded() {
        let outcome =
            RequestOutcome::failure(Duration::from_secs(1), RequestError::DeadlineExceeded);
        assert!(outcome.is_deadline_exceeded());

        let outcome = RequestOutcome::failure(Duration::from_secs(1), RequestError::Cancelled);
        assert!(!outcome.is_deadline_exceeded());
    }

    #[test]
    fn test_run_result_counts() {
        let result = RunResult {
            outcomes: vec![
                RequestOutcome::success(Duration::from_millis(5), StatusCode::OK, 13),
                RequestOutcome::failure(Duration::from_millis(5), RequestError::Other("boom".into())),
                RequestOutcome::success(Duration::from_millis(7), StatusCode::OK, 13),
            ],
            duration: Duration::from_millis(12),
        };
        assert_eq!(result.successful(), 2);
        assert_eq!(result.failed(), 1);
    }
}
