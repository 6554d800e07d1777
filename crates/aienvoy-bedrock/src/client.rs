// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SigV4-signed HTTP client for the Bedrock runtime API.

use std::time::Duration;

use aienvoy_core::{EnvoyError, TokenUsage};
use aienvoy_stream::FrameStream;
use aienvoy_stream::transport::{self, READ_TIMEOUT, REQUEST_TIMEOUT};
use aienvoy_stream::eventstream::{self, EventMessage};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use tracing::debug;

use crate::sigv4::{self, Credentials, SigningRequest};
use crate::types::{BedrockRequest, BedrockResponse, ErrorPayload};

const SERVICE: &str = "bedrock";
const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";

/// A non-streamed invocation result.
#[derive(Debug, Clone)]
pub struct InvokeOutput {
    pub response: BedrockResponse,
    /// Token counts from the `x-amzn-bedrock-*-token-count` headers.
    pub usage: Option<TokenUsage>,
}

/// HTTP client for `bedrock-runtime`.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    client: reqwest::Client,
    credentials: Credentials,
    region: String,
    /// `scheme://host[:port]`
    origin: String,
    /// `host[:port]` as sent in the `Host` header.
    host: String,
    path_prefix: String,
    timeout: Duration,
}

impl BedrockClient {
    /// Creates a client for `region`.
    ///
    /// `endpoint` overrides `https://bedrock-runtime.{region}.amazonaws.com`.
    pub fn new(
        credentials: Credentials,
        region: &str,
        endpoint: Option<&str>,
    ) -> Result<Self, EnvoyError> {
        let endpoint = endpoint
            .map(String::from)
            .unwrap_or_else(|| format!("https://bedrock-runtime.{region}.amazonaws.com"));
        let url = reqwest::Url::parse(&endpoint)
            .map_err(|e| EnvoyError::Config(format!("invalid Bedrock endpoint `{endpoint}`: {e}")))?;
        let host_name = url
            .host_str()
            .ok_or_else(|| EnvoyError::Config(format!("Bedrock endpoint `{endpoint}` has no host")))?;
        let host = match url.port() {
            Some(port) => format!("{host_name}:{port}"),
            None => host_name.to_string(),
        };

        let client = transport::client_builder()
            .build()
            .map_err(|e| EnvoyError::provider_from(format!("failed to build HTTP client: {e}"), e))?;

        Ok(Self {
            client,
            credentials,
            region: region.to_string(),
            origin: format!("{}://{host}", url.scheme()),
            host,
            path_prefix: url.path().trim_end_matches('/').to_string(),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Overrides the deadline for unary invocations.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn send(
        &self,
        model: &str,
        action: &str,
        accept: &'static str,
        body: &BedrockRequest,
    ) -> Result<reqwest::Response, EnvoyError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| EnvoyError::provider_from(format!("failed to encode request: {e}"), e))?;
        let path = format!(
            "{}/model/{}/{action}",
            self.path_prefix,
            sigv4::uri_encode(model)
        );

        let signed = sigv4::sign(
            &self.credentials,
            &self.region,
            SERVICE,
            &SigningRequest {
                method: "POST",
                host: &self.host,
                path: &path,
                query: "",
                headers: &[("content-type", "application/json")],
                payload: &payload,
            },
            chrono::Utc::now(),
        )?;

        let mut request = self
            .client
            .post(format!("{}{path}", self.origin))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept)
            .body(payload);
        for (name, value) in signed {
            request = request.header(name, value);
        }
        let limit = if accept == EVENT_STREAM_CONTENT_TYPE {
            READ_TIMEOUT
        } else {
            request = request.timeout(self.timeout);
            self.timeout
        };

        let response = request
            .send()
            .await
            .map_err(|e| transport::request_error("HTTP request failed", e, limit))?;
        debug!(status = %response.status(), model, action, "bedrock response received");
        ensure_success(response).await
    }

    /// `POST /model/{id}/invoke`.
    pub async fn invoke(
        &self,
        model: &str,
        body: &BedrockRequest,
    ) -> Result<InvokeOutput, EnvoyError> {
        let response = self.send(model, "invoke", "application/json", body).await?;
        let usage = header_usage(response.headers());
        let response = response
            .json()
            .await
            .map_err(|e| transport::request_error("failed to parse Bedrock response", e, self.timeout))?;
        Ok(InvokeOutput { response, usage })
    }

    /// `POST /model/{id}/invoke-with-response-stream`, framed as event-stream messages.
    pub async fn invoke_stream(
        &self,
        model: &str,
        body: &BedrockRequest,
    ) -> Result<FrameStream<EventMessage>, EnvoyError> {
        let response = self
            .send(
                model,
                "invoke-with-response-stream",
                EVENT_STREAM_CONTENT_TYPE,
                body,
            )
            .await?;
        Ok(eventstream::messages(response.bytes_stream()))
    }
}

fn header_usage(headers: &HeaderMap) -> Option<TokenUsage> {
    let count = |name: &str| -> Option<u32> { headers.get(name)?.to_str().ok()?.parse().ok() };
    Some(TokenUsage::new(
        count("x-amzn-bedrock-input-token-count")?,
        count("x-amzn-bedrock-output-token-count")?,
    ))
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EnvoyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_type = response
        .headers()
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(':').next().unwrap_or(v).to_string());
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorPayload>(&body)
        .ok()
        .and_then(|p| p.message)
        .unwrap_or(body);
    let message = match error_type {
        Some(kind) => format!("Bedrock API error {status} ({kind}): {detail}"),
        None => format!("Bedrock API error {status}: {detail}"),
    };
    Err(EnvoyError::provider(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> BedrockClient {
        BedrockClient::new(
            Credentials {
                access_key_id: "AKID".into(),
                secret_access_key: "secret".into(),
                session_token: Some("tok".into()),
            },
            "us-east-1",
            Some(uri),
        )
        .unwrap()
    }

    fn body() -> BedrockRequest {
        BedrockRequest {
            prompt: "\n\nHuman: Hi\n\nAssistant:".into(),
            max_tokens_to_sample: 16,
            temperature: None,
            top_p: None,
            stop_sequences: Vec::new(),
        }
    }

    #[test]
    fn default_endpoint_uses_region() {
        let c = BedrockClient::new(
            Credentials {
                access_key_id: "a".into(),
                secret_access_key: "b".into(),
                session_token: None,
            },
            "eu-central-1",
            None,
        )
        .unwrap();
        assert_eq!(c.host, "bedrock-runtime.eu-central-1.amazonaws.com");
        assert_eq!(c.origin, "https://bedrock-runtime.eu-central-1.amazonaws.com");
    }

    #[tokio::test]
    async fn invoke_signs_request_and_reads_usage_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/anthropic.claude-v2/invoke"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .and(header("x-amz-security-token", "tok"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-amzn-bedrock-input-token-count", "7")
                    .insert_header("x-amzn-bedrock-output-token-count", "3")
                    .set_body_json(serde_json::json!({
                        "completion": " Hello!",
                        "stop_reason": "stop_sequence"
                    })),
            )
            .mount(&server)
            .await;

        let output = client(&server.uri())
            .invoke("anthropic.claude-v2", &body())
            .await
            .unwrap();
        assert_eq!(output.response.completion, " Hello!");
        assert_eq!(output.usage, Some(TokenUsage::new(7, 3)));
    }

    #[tokio::test]
    async fn model_id_is_percent_encoded_in_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/anthropic.claude-v2%3A1/invoke"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"completion": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let output = client(&server.uri())
            .invoke("anthropic.claude-v2:1", &body())
            .await
            .unwrap();
        assert_eq!(output.response.completion, "ok");
        assert!(output.usage.is_none());
    }

    #[tokio::test]
    async fn error_includes_type_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-amzn-errortype", "AccessDeniedException:http://internal.amazon.com/coral/")
                    .set_body_json(serde_json::json!({"message": "not authorized"})),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .invoke("anthropic.claude-v2", &body())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("403"), "{err}");
        assert!(err.contains("AccessDeniedException"), "{err}");
        assert!(err.contains("not authorized"), "{err}");
    }

    #[tokio::test]
    async fn slow_invoke_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/anthropic.claude-v2/invoke"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .with_timeout(Duration::from_millis(50))
            .invoke("anthropic.claude-v2", &body())
            .await
            .unwrap_err();
        assert!(
            matches!(err, EnvoyError::Timeout { duration } if duration == Duration::from_millis(50)),
            "{err}"
        );
    }
}
