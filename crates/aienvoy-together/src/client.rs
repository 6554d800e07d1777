// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Together.xyz inference API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use aienvoy_core::EnvoyError;
use aienvoy_stream::transport::{self, READ_TIMEOUT, REQUEST_TIMEOUT};
use aienvoy_stream::{FrameStream, SseFrame, sse};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, error};

use crate::types::{CompletionRequest, CompletionResponse, ModelInfo};

pub const DEFAULT_BASE_URL: &str = "https://api.together.xyz";
const CLIENT_USER_AGENT: &str = "TogetherPythonOfficial/0.2.10";
const MODELS_CACHE_FILE: &str = "together_models.json";

/// Together.xyz client. Model metadata is cached on disk between runs.
#[derive(Debug, Clone)]
pub struct TogetherClient {
    client: reqwest::Client,
    base_url: String,
    models_cache: PathBuf,
    timeout: Duration,
}

impl TogetherClient {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self, EnvoyError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| EnvoyError::Config(format!("invalid Together API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

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
            models_cache: std::env::temp_dir().join(MODELS_CACHE_FILE),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Overrides the deadline for unary requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides where `/models/info` is cached.
    pub fn with_models_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.models_cache = path.into();
        self
    }

    pub fn models_cache(&self) -> &Path {
        &self.models_cache
    }

    async fn post_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response, EnvoyError> {
        let mut builder = self
            .client
            .post(format!("{}/v1/completions", self.base_url))
            .json(request);
        let limit = if request.stream_tokens {
            READ_TIMEOUT
        } else {
            builder = builder.timeout(self.timeout);
            self.timeout
        };
        let response = builder
            .send()
            .await
            .map_err(|e| transport::request_error("HTTP request failed", e, limit))?;
        debug!(status = %response.status(), stream = request.stream_tokens, "completion response received");
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(EnvoyError::provider(format!(
            "Together API returned {status}: {body}"
        )))
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, EnvoyError> {
        let mut req = request.clone();
        req.stream_tokens = false;
        self.post_completion(&req)
            .await?
            .json()
            .await
            .map_err(|e| transport::request_error("failed to parse API response", e, self.timeout))
    }

    pub async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<FrameStream<SseFrame>, EnvoyError> {
        let mut req = request.clone();
        req.stream_tokens = true;
        let response = self.post_completion(&req).await?;
        Ok(sse::frames(response.bytes_stream()))
    }

    async fn fetch_models_info(&self) -> Result<Vec<serde_json::Value>, EnvoyError> {
        let response = self
            .client
            .get(format!("{}/models/info", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport::request_error("HTTP request failed", e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnvoyError::provider(format!(
                "Together /models/info returned {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| transport::request_error("failed to parse model info", e, self.timeout))
    }

    /// All model metadata, read from the cache file and fetched into it when
    /// absent. Failures are logged and yield an empty list.
    pub async fn models_info(&self) -> Vec<ModelInfo> {
        if tokio::fs::metadata(&self.models_cache).await.is_err() {
            match self.fetch_models_info().await {
                Ok(models) => self.save_cache(&models).await,
                Err(e) => error!(error = %e, "list models"),
            }
        }
        self.read_cache().await
    }

    async fn save_cache(&self, models: &[serde_json::Value]) {
        let encoded = match serde_json::to_vec(models) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, "list models");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.models_cache, encoded).await {
            error!(error = %e, file = %self.models_cache.display(), "list models");
        }
    }

    async fn read_cache(&self) -> Vec<ModelInfo> {
        debug!(file = %self.models_cache.display(), "read models cache");
        let raw = match tokio::fs::read(&self.models_cache).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, file = %self.models_cache.display(), "list models");
                return Vec::new();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            error!(error = %e, file = %self.models_cache.display(), "list models");
            Vec::new()
        })
    }

    /// Names of chat models.
    pub async fn list_models(&self) -> Vec<String> {
        self.models_info()
            .await
            .into_iter()
            .filter(ModelInfo::is_chat)
            .map(|m| m.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn models_body() -> serde_json::Value {
        json!([
            {"_id": "1", "name": "togethercomputer/llama-2-7b-chat", "display_type": "chat",
             "config": {"prompt_format": "[INST] {prompt} [/INST]", "stop": ["[INST]"]}},
            {"_id": "2", "name": "stabilityai/stable-diffusion-xl", "display_type": "image"},
            {"_id": "3", "name": "togethercomputer/RedPajama-INCITE-Chat-3B-v1", "display_type": "chat", "config": null}
        ])
    }

    #[tokio::test]
    async fn list_models_fetches_once_then_uses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/info"))
            .and(header("user-agent", CLIENT_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = TogetherClient::new("key", Some(&server.uri()))
            .unwrap()
            .with_models_cache(dir.path().join("models.json"));

        let names = client.list_models().await;
        assert_eq!(
            names,
            vec![
                "togethercomputer/llama-2-7b-chat",
                "togethercomputer/RedPajama-INCITE-Chat-3B-v1"
            ]
        );
        assert!(client.models_cache().exists());
        assert_eq!(client.list_models().await.len(), 2);
    }

    #[tokio::test]
    async fn fetch_failure_yields_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/info"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let client = TogetherClient::new("key", Some(&server.uri()))
            .unwrap()
            .with_models_cache(dir.path().join("models.json"));
        assert!(client.list_models().await.is_empty());
        assert!(!client.models_cache().exists());
    }

    #[tokio::test]
    async fn completion_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;
        let client = TogetherClient::new("key", Some(&server.uri())).unwrap();
        let request = CompletionRequest {
            model: "m".into(),
            prompt: "p".into(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: Vec::new(),
            stream_tokens: false,
        };
        let err = client.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid key"));
    }

    #[tokio::test]
    async fn slow_completion_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let client = TogetherClient::new("key", Some(&server.uri()))
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let request = CompletionRequest {
            model: "m".into(),
            prompt: "p".into(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: Vec::new(),
            stream_tokens: false,
        };
        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, EnvoyError::Timeout { .. }), "{err}");
    }
}
