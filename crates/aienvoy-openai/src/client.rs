// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI chat completions, models and embeddings APIs.

use std::time::Duration;

use aienvoy_core::EnvoyError;
use aienvoy_stream::transport::{self, READ_TIMEOUT, REQUEST_TIMEOUT};
use aienvoy_stream::{FrameStream, SseFrame, sse};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use aienvoy_core::{EmbeddingRequest, EmbeddingResponse};

use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse, ModelList};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OpenAiClient {
    /// Creates a client authenticating with `api_key`.
    ///
    /// `base_url` defaults to [`DEFAULT_BASE_URL`]; a trailing slash is ignored.
    pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self, EnvoyError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| EnvoyError::Config(format!("invalid OpenAI API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let client = transport::client_builder()
            .default_headers(headers)
            .build()
            .map_err(|e| EnvoyError::provider_from(format!("failed to build HTTP client: {e}"), e))?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Overrides the deadline for unary requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_chat(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response, EnvoyError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request);
        let limit = if request.stream {
            READ_TIMEOUT
        } else {
            builder = builder.timeout(self.timeout);
            self.timeout
        };
        let response = builder
            .send()
            .await
            .map_err(|e| transport::request_error("HTTP request failed", e, limit))?;
        debug!(status = %response.status(), stream = request.stream, "chat completion response received");
        ensure_success(response).await
    }

    /// Sends a non-streaming completion request.
    pub async fn chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, EnvoyError> {
        let mut req = request.clone();
        req.stream = false;
        let response = self.post_chat(&req).await?;
        response
            .json()
            .await
            .map_err(|e| transport::request_error("failed to parse API response", e, self.timeout))
    }

    /// Sends a streaming completion request and returns its SSE frames.
    pub async fn chat_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<FrameStream<SseFrame>, EnvoyError> {
        let mut req = request.clone();
        req.stream = true;
        let response = self.post_chat(&req).await?;
        Ok(sse::frames(response.bytes_stream()))
    }

    /// `GET /models`.
    pub async fn list_models(&self) -> Result<ModelList, EnvoyError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport::request_error("HTTP request failed", e, self.timeout))?;
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| transport::request_error("failed to parse model list", e, self.timeout))
    }

    /// `POST /embeddings`.
    pub async fn embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, EnvoyError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport::request_error("HTTP request failed", e, self.timeout))?;
        debug!(status = %response.status(), model = %request.model, "embeddings response received");
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| transport::request_error("failed to parse embeddings", e, self.timeout))
    }
}

/// Turns a non-2xx response into [`EnvoyError::Provider`] carrying status and body.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EnvoyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_err) => format!(
            "OpenAI API error {status} ({}): {}",
            api_err.error.type_.as_deref().unwrap_or("unknown"),
            api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    };
    Err(EnvoyError::provider(message))
}
