// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`EnvoyError`] to HTTP error responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use aienvoy_core::EnvoyError;

/// Error body returned by every route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An [`EnvoyError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub EnvoyError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EnvoyError::UnknownModel(_) | EnvoyError::InvalidRequest(_) | EnvoyError::Config(_) => {
                StatusCode::BAD_REQUEST
            }
            EnvoyError::NotFound { .. } => StatusCode::NOT_FOUND,
            EnvoyError::Provider { .. } | EnvoyError::Stream { .. } => StatusCode::BAD_GATEWAY,
            EnvoyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EnvoyError> for ApiError {
    fn from(err: EnvoyError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(EnvoyError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (EnvoyError::UnknownModel("x".into()), StatusCode::BAD_REQUEST),
            (EnvoyError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                EnvoyError::NotFound {
                    kind: "conversation",
                    id: "c1".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (EnvoyError::provider("upstream 500"), StatusCode::BAD_GATEWAY),
            (EnvoyError::stream("eof"), StatusCode::BAD_GATEWAY),
            (
                EnvoyError::Timeout {
                    duration: std::time::Duration::from_secs(300),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (EnvoyError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[test]
    fn error_response_serialization() {
        let resp = ErrorResponse {
            error: "unknown model: gpt-9".into(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"error":"unknown model: gpt-9"}"#);
    }
}
