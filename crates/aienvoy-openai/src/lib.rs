// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI provider adapter for aienvoy.
//!
//! Implements [`ProviderAdapter`] over the chat completions and embeddings
//! APIs. Streamed
//! answers arrive as Server-Sent Events whose `data:` payloads are
//! completion chunks, terminated by `data: [DONE]`.

pub mod client;
pub mod types;

use async_trait::async_trait;
use aienvoy_config::model::LlmConfig;
use aienvoy_core::{
    AdapterType, ChatRequest, ChatResponse, ChatStream, EmbeddingRequest, EmbeddingResponse,
    EnvoyError, HealthStatus, PluginAdapter, ProviderAdapter, StreamDelta,
};
use aienvoy_stream::{Normalize, Normalized, SseFrame};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatCompletionChunk, ChatCompletionRequest, ModelList};

/// Models served when the configuration lists none.
pub const DEFAULT_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-0613",
    "gpt-3.5-turbo-16k",
    "gpt-3.5-turbo-16k-0613",
    "gpt-4",
    "gpt-4-0613",
    "gpt-4-32k",
    "gpt-4-32k-0613",
];

/// OpenAI provider implementing [`ProviderAdapter`].
pub struct OpenAiProvider {
    client: OpenAiClient,
    models: Vec<String>,
}

impl OpenAiProvider {
    /// Creates a provider from one `[[llms]]` entry.
    pub fn new(config: &LlmConfig) -> Result<Self, EnvoyError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| EnvoyError::Config("openai requires api_key".into()))?;
        let client = OpenAiClient::new(api_key, config.base_url.as_deref())?;
        info!(base_url = client.base_url(), "OpenAI provider initialized");
        Ok(Self::with_client(client, config.models.clone()))
    }

    /// Creates a provider around an existing client. An empty model list
    /// selects [`DEFAULT_MODELS`].
    pub fn with_client(client: OpenAiClient, models: Vec<String>) -> Self {
        let models = if models.is_empty() {
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            models
        };
        Self { client, models }
    }

    /// Lists the models the account can access, straight from the API.
    pub async fn fetch_models(&self) -> Result<ModelList, EnvoyError> {
        self.client.list_models().await
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        debug!("OpenAI provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn list_models(&self) -> Result<Vec<String>, EnvoyError> {
        Ok(self.models.clone())
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EnvoyError> {
        info!(model = %request.model, is_stream = false, "chat start");
        let response = self.client.chat(&ChatCompletionRequest::from(request)).await?;

        let choice = response.choices.into_iter().next();
        let created = chrono::DateTime::from_timestamp(response.created, 0)
            .unwrap_or_else(chrono::Utc::now);
        let result = ChatResponse {
            id: response.id,
            model: response.model,
            content: choice
                .as_ref()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default(),
            finish_reason: choice.and_then(|c| c.finish_reason),
            usage: response.usage.map(Into::into),
            created,
        };
        info!(model = %result.model, is_stream = false, "chat success");
        Ok(result)
    }

    fn stream(&self, request: ChatRequest) -> ChatStream {
        info!(model = %request.model, is_stream = true, "chat start");
        let client = self.client.clone();
        let normalizer = ChunkNormalizer {
            model: request.model.clone(),
        };
        let request = ChatCompletionRequest::from(request);
        aienvoy_stream::spawn(
            "openai",
            async move { client.chat_stream(&request).await },
            normalizer,
        )
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, EnvoyError> {
        info!(model = %request.model, inputs = request.input.texts().len(), "embeddings start");
        let response = self.client.embeddings(&request).await?;
        info!(model = %response.model, vectors = response.data.len(), "embeddings success");
        Ok(response)
    }
}

/// Maps completion-chunk SSE frames to deltas.
struct ChunkNormalizer {
    /// Requested model, used when a chunk omits its own.
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

        let chunk: ChatCompletionChunk = frame.json()?;
        let model = if chunk.model.is_empty() {
            self.model.clone()
        } else {
            chunk.model
        };
        let (text, finish_reason) = match chunk.choices.into_iter().next() {
            Some(choice) => (choice.delta.content.unwrap_or_default(), choice.finish_reason),
            None => (String::new(), None),
        };
        let usage = chunk.usage.map(Into::into);

        if text.is_empty() && finish_reason.is_none() && usage.is_none() {
            return Ok(Normalized::Skip);
        }
        Ok(Normalized::Delta(StreamDelta {
            delta_text: text,
            model,
            finish_reason,
            usage,
        }))
    }
}
