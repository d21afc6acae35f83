//! `spikeys` is a library for load-testing HTTP endpoints.
//!
//! It sends a configured number of `GET` requests to a single URL, keeping a
//! bounded number of them in flight, and returns one
//! [`RequestOutcome`] per request together with the total duration of the
//! run.
//!
//! "Hello world" example:
//! ```no_run
//! use std::time::Duration;
//! use spikeys_lib::{BenchmarkConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let config = BenchmarkConfig::new(
//!       "http://localhost:8080/",
//!       100,
//!       10,
//!       Duration::from_secs(5),
//!       Duration::from_secs(30),
//!   )?;
//!   let result = spikeys_lib::run(config).await?;
//!   println!("{} of {} requests succeeded", result.successful(), result.outcomes.len());
//!   Ok(())
//! }
//! ```
//!
//! For more specific use-cases, build an [`HttpPerformer`] yourself with
//! [`PerformerBuilder`], or implement [`RequestPerformer`], and hand it to a
//! [`Dispatcher`].
#![warn(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]

mod config;
mod dispatcher;
mod performer;
mod scope;
mod slots;
mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{
    BenchmarkConfig, DEFAULT_BENCHMARK_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_REQUEST_COUNT, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use dispatcher::Dispatcher;
pub use performer::{
    DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT, HttpPerformer, PerformerBuilder, RequestPerformer,
};
pub use scope::{CancelScope, ScopeError};
pub use types::*;

/// Run a benchmark with the default [`HttpPerformer`].
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created, or any of the
/// errors of [`Dispatcher::run`].
pub async fn run(config: BenchmarkConfig) -> Result<RunResult> {
    let performer = PerformerBuilder::default().performer()?;
    Dispatcher::new(config, performer).run().await
}
