// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AWS Bedrock provider adapter for Anthropic Claude models.
//!
//! Requests use Claude's text-completion body and are signed with AWS
//! Signature Version 4. Streamed answers arrive as binary
//! `application/vnd.amazon.eventstream` messages whose `chunk` events
//! carry base64-encoded completion JSON.

pub mod client;
pub mod sigv4;
pub mod types;

use async_trait::async_trait;
use aienvoy_config::model::{AwsConfig, LlmConfig};
use aienvoy_core::{
    AdapterType, ChatRequest, ChatResponse, ChatStream, EnvoyError, HealthStatus, PluginAdapter,
    ProviderAdapter, StreamDelta,
};
use aienvoy_stream::eventstream::EventMessage;
use aienvoy_stream::{Normalize, Normalized};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use crate::client::BedrockClient;
use crate::sigv4::Credentials;
use crate::types::{BedrockRequest, BedrockResponse, ChunkPayload, ErrorPayload};

pub const MODEL_CLAUDE_V2: &str = "anthropic.claude-v2";
pub const MODEL_CLAUDE_V1: &str = "anthropic.claude-v1";
pub const MODEL_CLAUDE_INSTANT_V1: &str = "anthropic.claude-instant-v1";

/// Models always served by this provider.
pub const DEFAULT_MODELS: &[&str] = &[MODEL_CLAUDE_V2, MODEL_CLAUDE_V1, MODEL_CLAUDE_INSTANT_V1];

/// Bedrock Claude provider implementing [`ProviderAdapter`].
pub struct BedrockProvider {
    client: BedrockClient,
    models: Vec<String>,
}

impl BedrockProvider {
    /// Creates a provider from an `[[llms]]` entry and its resolved credentials.
    pub fn new(config: &LlmConfig, aws: &AwsConfig) -> Result<Self, EnvoyError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| EnvoyError::Config(format!("aws-bedrock requires {name}")))
        };
        let region = required(&aws.region, "region")?;
        let credentials = Credentials {
            access_key_id: required(&aws.access_key_id, "access_key_id")?,
            secret_access_key: required(&aws.secret_access_key, "secret_access_key")?,
            session_token: aws.session_token.clone(),
        };
        let client = BedrockClient::new(credentials, &region, config.base_url.as_deref())?;
        info!(region = %region, "Bedrock provider initialized");
        Ok(Self::with_client(client, config.models.clone()))
    }

    /// Creates a provider around an existing client. Configured models are
    /// served in addition to [`DEFAULT_MODELS`].
    pub fn with_client(client: BedrockClient, extra_models: Vec<String>) -> Self {
        let mut models: Vec<String> = DEFAULT_MODELS.iter().map(|m| m.to_string()).collect();
        for model in extra_models {
            if !models.contains(&model) {
                models.push(model);
            }
        }
        Self { client, models }
    }
}

#[async_trait]
impl PluginAdapter for BedrockProvider {
    fn name(&self) -> &str {
        "aws-bedrock"
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
        debug!("Bedrock provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for BedrockProvider {
    async fn list_models(&self) -> Result<Vec<String>, EnvoyError> {
        Ok(self.models.clone())
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EnvoyError> {
        info!(model = %request.model, is_stream = false, "chat start");
        let body = BedrockRequest::from(&request);
        let output = self.client.invoke(&request.model, &body).await?;

        let usage = output
            .response
            .invocation_metrics
            .map(Into::into)
            .or(output.usage);
        info!(model = %request.model, is_stream = false, "chat success");
        Ok(ChatResponse {
            id: uuid::Uuid::new_v4().to_string(),
            model: request.model,
            content: output.response.completion,
            finish_reason: output.response.stop_reason,
            usage,
            created: chrono::Utc::now(),
        })
    }

    fn stream(&self, request: ChatRequest) -> ChatStream {
        info!(model = %request.model, is_stream = true, "chat start");
        let client = self.client.clone();
        let body = BedrockRequest::from(&request);
        let normalizer = EventNormalizer {
            model: request.model.clone(),
        };
        let model = request.model;
        aienvoy_stream::spawn(
            "aws-bedrock",
            async move { client.invoke_stream(&model, &body).await },
            normalizer,
        )
    }
}

/// Maps Bedrock event-stream messages to deltas.
struct EventNormalizer {
    model: String,
}

impl Normalize for EventNormalizer {
    type Frame = EventMessage;

    fn normalize(&mut self, message: EventMessage) -> Result<Normalized, EnvoyError> {
        match message.message_type() {
            Some("event") => {}
            Some(kind @ ("exception" | "error")) => {
                let name = message
                    .header_str(":exception-type")
                    .or_else(|| message.header_str(":error-code"))
                    .unwrap_or(kind)
                    .to_string();
                let detail = serde_json::from_slice::<ErrorPayload>(&message.payload)
                    .ok()
                    .and_then(|p| p.message)
                    .or_else(|| message.header_str(":error-message").map(String::from))
                    .unwrap_or_else(|| String::from_utf8_lossy(&message.payload).into_owned());
                return Err(EnvoyError::provider(format!("Bedrock {name}: {detail}")));
            }
            other => {
                return Err(EnvoyError::stream(format!(
                    "unknown message type: {}",
                    other.unwrap_or("<missing>")
                )));
            }
        }

        match message.event_type() {
            Some("chunk") => {}
            other => {
                return Err(EnvoyError::stream(format!(
                    "unknown event type: {}",
                    other.unwrap_or("<missing>")
                )));
            }
        }

        let chunk: ChunkPayload = serde_json::from_slice(&message.payload).map_err(|e| {
            EnvoyError::stream_from(format!("malformed chunk payload: {e}"), e)
        })?;
        let decoded = STANDARD
            .decode(chunk.bytes.as_bytes())
            .map_err(|e| EnvoyError::stream_from(format!("chunk bytes are not base64: {e}"), e))?;
        let response: BedrockResponse = serde_json::from_slice(&decoded).map_err(|e| {
            EnvoyError::stream_from(format!("malformed completion chunk: {e}"), e)
        })?;

        Ok(Normalized::Delta(StreamDelta {
            delta_text: response.completion,
            model: self.model.clone(),
            finish_reason: response.stop_reason,
            usage: response.invocation_metrics.map(Into::into),
        }))
    }
}
