// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Together.xyz provider adapter for aienvoy.
//!
//! Together serves open models through a text-completion endpoint, so chat
//! transcripts are rendered into a single prompt using each model's
//! advertised prompt format.

pub mod client;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use aienvoy_config::model::LlmConfig;
use aienvoy_core::{
    AdapterType, ChatRequest, ChatResponse, ChatStream, EnvoyError, HealthStatus, PluginAdapter,
    ProviderAdapter, StreamDelta,
};
use aienvoy_stream::{Normalize, Normalized, SseFrame};
use tracing::{debug, info};

pub use client::TogetherClient;
use types::{CompletionRequest, CompletionResponse};

/// Together.xyz provider implementing [`ProviderAdapter`].
pub struct TogetherProvider {
    client: Arc<TogetherClient>,
}

impl TogetherProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, EnvoyError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| EnvoyError::Config("together requires api_key".into()))?;
        let client = TogetherClient::new(api_key, config.base_url.as_deref())?;
        info!("Together provider initialized");
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: TogetherClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

/// Builds the completion body, looking up the model's prompt format.
async fn completion_request(client: &TogetherClient, request: &ChatRequest) -> CompletionRequest {
    let models = client.models_info().await;
    let info = models.iter().find(|m| m.name == request.model);
    CompletionRequest::new(request, info)
}

#[async_trait]
impl PluginAdapter for TogetherProvider {
    fn name(&self) -> &str {
        "together"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, EnvoyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), EnvoyError> {
        debug!("Together provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for TogetherProvider {
    async fn list_models(&self) -> Result<Vec<String>, EnvoyError> {
        Ok(self.client.list_models().await)
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EnvoyError> {
        info!(model = %request.model, is_stream = false, "chat start");
        let body = completion_request(&self.client, &request).await;
        let response: CompletionResponse = self.client.complete(&body).await?;
        let choice = response.choices.into_iter().next();
        info!(model = %request.model, is_stream = false, "chat success");
        Ok(ChatResponse {
            id: response.id,
            model: if response.model.is_empty() {
                request.model
            } else {
                response.model
            },
            content: choice.as_ref().map(|c| c.text.clone()).unwrap_or_default(),
            finish_reason: choice.and_then(|c| c.finish_reason),
            usage: response.usage.map(Into::into),
            created: chrono::Utc::now(),
        })
    }

    fn stream(&self, request: ChatRequest) -> ChatStream {
        info!(model = %request.model, is_stream = true, "chat start");
        let client = Arc::clone(&self.client);
        let normalizer = ChunkNormalizer {
            model: request.model.clone(),
        };
        aienvoy_stream::spawn(
            "together",
            async move {
                let body = completion_request(&client, &request).await;
                client.complete_stream(&body).await
            },
            normalizer,
        )
    }
}

/// Maps SSE chunks carrying `choices[0].text` to deltas.
struct ChunkNormalizer {
    model: String,
}

impl Normalize for ChunkNormalizer {
    type Frame = SseFrame;

    fn normalize(&mut self, frame: SseFrame) -> Result<Normalized, EnvoyError> {
        if frame.is_done() {
            return Ok(Normalized::Done);
        }
        if frame.data.trim().is_empty() {
            return Ok(Normalized::Skip);
        }
        let chunk: CompletionResponse = frame.json()?;
        let (text, finish_reason) = match chunk.choices.into_iter().next() {
            Some(choice) => (choice.text, choice.finish_reason),
            None => (String::new(), None),
        };
        let usage = chunk.usage.map(Into::into);
        if text.is_empty() && finish_reason.is_none() && usage.is_none() {
            return Ok(Normalized::Skip);
        }
        Ok(Normalized::Delta(StreamDelta {
            delta_text: text,
            model: self.model.clone(),
            finish_reason,
            usage,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aienvoy_core::{ChatMessage, TokenUsage};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "togethercomputer/llama-2-7b-chat";

    fn frame(data: &str) -> SseFrame {
        SseFrame {
            event: "message".into(),
            data: data.into(),
        }
    }

    async fn setup() -> (MockServer, tempfile::TempDir, TogetherProvider) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": MODEL, "display_type": "chat",
                 "config": {"prompt_format": "[INST] {prompt} [/INST]", "stop": ["[INST]"]}}
            ])))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let client = TogetherClient::new("key", Some(&server.uri()))
            .unwrap()
            .with_models_cache(dir.path().join("models.json"));
        (server, dir, TogetherProvider::with_client(client))
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: MODEL.into(),
            messages: vec![ChatMessage::user("Hi")],
            ..Default::default()
        }
    }

    #[test]
    fn normalizer_handles_done_and_text() {
        let mut n = ChunkNormalizer { model: MODEL.into() };
        assert_eq!(n.normalize(frame("[DONE]")).unwrap(), Normalized::Done);
        assert_eq!(
            n.normalize(frame(r#"{"choices":[{"text":"Hi"}]}"#)).unwrap(),
            Normalized::Delta(StreamDelta::text(MODEL, "Hi"))
        );
        assert_eq!(
            n.normalize(frame(r#"{"choices":[{"text":""}]}"#)).unwrap(),
            Normalized::Skip
        );
        assert!(n.normalize(frame("{oops")).is_err());
    }

    #[tokio::test]
    async fn complete_uses_model_prompt_format() {
        let (server, _dir, provider) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(body_partial_json(json!({
                "prompt": "[INST] Hi [/INST]",
                "stop": ["[INST]"],
                "stream_tokens": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cmpl-1",
                "choices": [{"text": " Hello!", "finish_reason": "eos"}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.content, " Hello!");
        assert_eq!(response.model, MODEL);
        assert_eq!(response.usage, Some(TokenUsage::new(5, 3)));
    }

    #[tokio::test]
    async fn stream_collects_sse_text() {
        let (server, _dir, provider) = setup().await;
        let body = concat!(
            "data: {\"choices\":[{\"text\":\"Hel\"}]}\n\n",
            "data: {\"choices\":[{\"text\":\"lo\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(body_partial_json(json!({"stream_tokens": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let collected = provider.stream(request()).collect().await.unwrap();
        assert_eq!(collected.text, "Hello");
        assert_eq!(collected.deltas, 2);
    }

    #[tokio::test]
    async fn list_models_returns_chat_models() {
        let (_server, _dir, provider) = setup().await;
        assert_eq!(provider.list_models().await.unwrap(), vec![MODEL]);
    }
}
