//! Execution of a single benchmark request.
//!
//! The dispatcher only knows the [`RequestPerformer`] trait, so it can be
//! driven by a deterministic fake in tests. [`HttpPerformer`] is the default
//! implementation, sending real `GET` requests through [reqwest].
//!
//! [reqwest]: https://github.com/seanmonstar/reqwest
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use http::header::{self, HeaderMap, HeaderValue};
use typed_builder::TypedBuilder;
use url::Url;

use crate::{CancelScope, ErrorKind, RequestError, RequestOutcome, Result};

/// Default number of redirects followed before a request fails, 10.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
/// Default user agent, `spikeys/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("spikeys/", env!("CARGO_PKG_VERSION"));

/// Something that can send one request and report how it went.
///
/// Implementations never fail: every problem, including an elapsed deadline
/// or a cancelled `scope`, is reported through
/// [`RequestOutcome::error`]. They must return promptly once `scope` is
/// cancelled or its deadline elapses, reporting
/// [`RequestError::Cancelled`] or [`RequestError::DeadlineExceeded`]
/// respectively. Exactly one request is sent per call; there are no retries.
#[async_trait]
pub trait RequestPerformer: Send + Sync {
    /// Send one request to `url` within the bounds of `scope`
    async fn perform(&self, scope: &CancelScope, url: &Url) -> RequestOutcome;
}

#[async_trait]
impl<P> RequestPerformer for Arc<P>
where
    P: RequestPerformer + ?Sized,
{
    async fn perform(&self, scope: &CancelScope, url: &Url) -> RequestOutcome {
        (**self).perform(scope, url).await
    }
}

/// Builder for [`HttpPerformer`].
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `PerformerBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `PerformerBuilder`.
"))]
pub struct PerformerBuilder {
    /// User-agent sent with every request.
    ///
    /// Defaults to [`DEFAULT_USER_AGENT`].
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,
    /// Additional headers sent with every request
    custom_headers: HeaderMap,
    /// Maximum number of redirects followed per request.
    ///
    /// Defaults to [`DEFAULT_MAX_REDIRECTS`].
    #[builder(default = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,
}

impl Default for PerformerBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PerformerBuilder {
    /// Instantiates an [`HttpPerformer`].
    ///
    /// # Errors
    ///
    /// Returns an error if the user agent is not a valid header value or the
    /// underlying [reqwest] client cannot be created.
    ///
    /// [reqwest]: https://github.com/seanmonstar/reqwest
    pub fn performer(self) -> Result<HttpPerformer> {
        let Self {
            user_agent,
            custom_headers: mut headers,
            max_redirects,
        } = self;

        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&user_agent).map_err(ErrorKind::InvalidHeader)?,
        );

        let reqwest_client = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()
            .map_err(ErrorKind::BuildRequestClient)?;

        Ok(HttpPerformer { reqwest_client })
    }
}

/// Sends plain `GET` requests and counts the bytes of the response body
#[derive(Debug, Clone)]
pub struct HttpPerformer {
    reqwest_client: reqwest::Client,
}

impl HttpPerformer {
    /// Send the request and read the body to the end.
    ///
    /// Any status outside of `2xx` is a failure and the body is not read.
    async fn fetch(&self, url: &Url, start: Instant) -> RequestOutcome {
        let mut response = match self.reqwest_client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return RequestOutcome::failure(start.elapsed(), RequestError::Network(e)),
        };

        let status = response.status();
        if !status.is_success() {
            return RequestOutcome::failure(start.elapsed(), RequestError::UnexpectedStatus(status))
                .with_status(status);
        }

        // Count chunks as they arrive instead of buffering the whole body
        let mut bytes: u64 = 0;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => bytes += chunk.len() as u64,
                Ok(None) => break,
                Err(e) => {
                    return RequestOutcome::failure(start.elapsed(), RequestError::Body(e))
                        .with_status(status);
                }
            }
        }

        RequestOutcome::success(start.elapsed(), status, bytes)
    }
}

#[async_trait]
impl RequestPerformer for HttpPerformer {
    async fn perform(&self, scope: &CancelScope, url: &Url) -> RequestOutcome {
        let start = Instant::now();
        match scope.guard(self.fetch(url, start)).await {
            Ok(outcome) => outcome,
            Err(e) => RequestOutcome::failure(start.elapsed(), e.into()),
        }
    }
}
