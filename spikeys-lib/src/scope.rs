//! Cancellation scopes with a deadline.
//!
//! A [`CancelScope`] couples a [`CancellationToken`] with a deadline. Scopes
//! nest: a child shares its parent's cancellation, but has a deadline of its
//! own. Cancelling a child never affects the parent.
//!
//! A scope does not cancel itself when its deadline passes. [`CancelScope::guard`]
//! reports the elapsed deadline as [`ScopeError::DeadlineExceeded`], while an
//! explicit [`CancelScope::cancel`] on the scope or any ancestor is reported as
//! [`ScopeError::Cancelled`]. Whoever owns a scope decides what an expired
//! deadline means for its children; the dispatcher cancels the benchmark
//! scope, so in-flight requests see `Cancelled` rather than a deadline of
//! their own.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reason a guarded future did not run to completion
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    /// The scope's own deadline elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// The scope or one of its ancestors was cancelled
    #[error("cancelled")]
    Cancelled,
}

/// A bounded lifetime for dependent operations
#[derive(Debug, Clone)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Instant,
}

impl CancelScope {
    /// Create a root scope expiring `timeout` from now
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: deadline_after(timeout),
        }
    }

    /// Derive a scope which is cancelled together with `self` and expires
    /// `timeout` from now
    #[must_use]
    pub fn child(&self, timeout: Duration) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: deadline_after(timeout),
        }
    }

    /// Cancel this scope and all scopes derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` if this scope or one of its ancestors was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the scope is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// The instant at which this scope expires
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Completes once the deadline has elapsed
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.deadline).await;
    }

    /// Run `future` until it completes, the scope is cancelled, or the
    /// deadline elapses, whichever happens first.
    ///
    /// Cancellation takes precedence over the deadline when both are ready.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Cancelled`] or [`ScopeError::DeadlineExceeded`]
    /// if `future` was dropped before completing.
    pub async fn guard<F>(&self, future: F) -> Result<F::Output, ScopeError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(ScopeError::Cancelled),
            () = tokio::time::sleep_until(self.deadline) => Err(ScopeError::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}

/// `timeout` from now, capped at roughly thirty years for durations the
/// clock cannot represent
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
