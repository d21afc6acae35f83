#![allow(unreachable_pub)]

mod error;
mod outcome;

pub use error::{ErrorKind, RequestError};
pub use outcome::{RequestOutcome, RunResult};

/// The spikeys `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
