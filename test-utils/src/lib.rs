//! `test-utils` is used for testing in both `spikeys-lib` and `spikeys-bin`.
//! This crate does not depend on `spikeys-lib` or `spikeys-bin`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Create a mock web server which sleeps for the given duration before
/// answering every `GET` with `200 OK` and the given body.
#[macro_export]
macro_rules! delayed_mock_server {
    ($delay:expr, $body:expr) => {{
        let mock_server = wiremock::MockServer::start().await;
        let template = wiremock::ResponseTemplate::new(200)
            .set_body_string($body)
            .set_delay($delay);
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}
