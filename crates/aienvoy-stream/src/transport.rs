// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client settings shared by every provider.
//!
//! Whole-request deadlines only apply to unary calls. Streamed answers may
//! legitimately run for minutes, so they are bounded by [`READ_TIMEOUT`]
//! between body reads instead.

use std::time::Duration;

use aienvoy_core::EnvoyError;
use tracing::warn;

/// Time allowed to establish a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for a complete unary request, body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest silence tolerated between two reads of a response.
pub const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// A client builder with the connect and read limits applied.
///
/// Callers add headers or cookies and set [`REQUEST_TIMEOUT`] (or their own
/// limit) per unary request with `RequestBuilder::timeout`.
pub fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
}

/// Maps a failed `send()` or body read to an [`EnvoyError`].
///
/// Timeouts become [`EnvoyError::Timeout`] carrying `limit`; everything else
/// is a provider error prefixed with `context`.
pub fn request_error(context: &str, e: reqwest::Error, limit: Duration) -> EnvoyError {
    if e.is_timeout() {
        warn!(context, timeout = ?limit, "upstream request timed out");
        return EnvoyError::Timeout { duration: limit };
    }
    EnvoyError::provider_from(format!("{context}: {e}"), e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn slow_upstream_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let limit = Duration::from_millis(50);
        let client = client_builder().build().unwrap();
        let err = client
            .get(server.uri())
            .timeout(limit)
            .send()
            .await
            .map_err(|e| request_error("HTTP request failed", e, limit))
            .unwrap_err();
        assert!(
            matches!(err, EnvoyError::Timeout { duration } if duration == limit),
            "{err}"
        );
    }

    #[tokio::test]
    async fn refused_connection_is_a_provider_error() {
        let client = client_builder().build().unwrap();
        let err = client
            .get("http://127.0.0.1:1/")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| request_error("HTTP request failed", e, REQUEST_TIMEOUT))
            .unwrap_err();
        assert!(matches!(err, EnvoyError::Provider { .. }), "{err}");
        assert!(err.to_string().starts_with("provider error: HTTP request failed"));
    }
}
