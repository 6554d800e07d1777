// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bard web-session provider adapter for aienvoy.
//!
//! Bard produces its whole answer in one response, so streaming yields a
//! single delta followed by end-of-stream. Each ask starts a fresh Bard
//! conversation carrying the whole transcript as its prompt.

pub mod answer;
pub mod client;

use std::sync::Arc;

use async_trait::async_trait;
use aienvoy_config::model::BardConfig;
use aienvoy_core::{
    AdapterType, ChatMessage, ChatRequest, ChatResponse, ChatStream, EnvoyError, HealthStatus,
    PluginAdapter, ProviderAdapter, Role, StreamDelta,
};
use aienvoy_stream::{Normalize, Normalized};
use futures::StreamExt;
use tracing::{debug, info};

pub use answer::Answer;
pub use client::BardClient;

/// The single model name Bard is exposed under.
pub const MODEL: &str = "bard";

/// Flattens a transcript into one Bard prompt.
///
/// A lone user message is sent verbatim. Longer transcripts become labelled
/// turns separated by blank lines, so earlier turns reach Bard as context.
pub fn build_prompt(messages: &[ChatMessage]) -> String {
    if let [only] = messages
        && only.role == Role::User
    {
        return only.content.clone();
    }
    messages
        .iter()
        .map(|m| {
            let label = match m.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{label}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Bard provider implementing [`ProviderAdapter`].
pub struct BardProvider {
    client: Arc<BardClient>,
}

impl BardProvider {
    pub fn new(config: &BardConfig) -> Result<Self, EnvoyError> {
        let token = config
            .token
            .as_deref()
            .ok_or_else(|| EnvoyError::Config("bard requires token".into()))?;
        let client = BardClient::new(token, &config.cookies)?;
        info!("Bard provider initialized");
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: BardClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl PluginAdapter for BardProvider {
    fn name(&self) -> &str {
        "bard"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, EnvoyError> {
        match self.client.metadata().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), EnvoyError> {
        debug!("Bard provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for BardProvider {
    async fn list_models(&self) -> Result<Vec<String>, EnvoyError> {
        Ok(vec![MODEL.to_string()])
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EnvoyError> {
        info!(model = %request.model, is_stream = false, "chat start");
        let answer = self.client.ask(&build_prompt(&request.messages), None).await?;
        info!(model = %request.model, is_stream = false, "chat success");
        Ok(ChatResponse {
            id: answer.response_id,
            model: request.model,
            content: answer.content,
            finish_reason: Some("stop".into()),
            usage: None,
            created: chrono::Utc::now(),
        })
    }

    fn stream(&self, request: ChatRequest) -> ChatStream {
        info!(model = %request.model, is_stream = true, "chat start");
        let client = Arc::clone(&self.client);
        let prompt = build_prompt(&request.messages);
        aienvoy_stream::spawn(
            "bard",
            async move {
                let answer = client.ask(&prompt, None).await?;
                Ok(futures::stream::once(async move { Ok(answer) }).boxed())
            },
            AnswerNormalizer {
                model: request.model,
            },
        )
    }
}

/// Turns the one-shot answer into a single delta.
struct AnswerNormalizer {
    model: String,
}

impl Normalize for AnswerNormalizer {
    type Frame = Answer;

    fn normalize(&mut self, answer: Answer) -> Result<Normalized, EnvoyError> {
        Ok(Normalized::Delta(StreamDelta {
            delta_text: answer.content,
            model: self.model.clone(),
            finish_reason: Some("stop".into()),
            usage: None,
        }))
    }
}
