// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! claude.ai web-session provider adapter for aienvoy.
//!
//! Drives the same private API the claude.ai web app uses. Every chat
//! request opens a fresh remote conversation and appends the prompt to it;
//! the answer comes back as `data: {json}` lines.

pub mod client;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use aienvoy_config::model::ClaudeWebConfig;
use aienvoy_core::{
    AdapterType, ChatRequest, ChatResponse, ChatStream, EnvoyError, HealthStatus, PluginAdapter,
    ProviderAdapter, Role, StreamDelta,
};
use aienvoy_stream::{Normalize, Normalized};
use tracing::{debug, info};

use crate::client::ClaudeWebClient;

/// Remote conversation names are cut to this many characters of the prompt.
const CONVERSATION_NAME_CHARS: usize = 40;

/// claude.ai provider implementing [`ProviderAdapter`].
pub struct ClaudeWebProvider {
    client: Arc<ClaudeWebClient>,
}

impl ClaudeWebProvider {
    pub fn new(config: &ClaudeWebConfig) -> Result<Self, EnvoyError> {
        let session_key = config
            .session_key
            .as_deref()
            .ok_or_else(|| EnvoyError::Config("claude_web requires session_key".into()))?;
        let client = ClaudeWebClient::new(session_key, &config.model, &config.timezone)?;
        info!(model = %config.model, "claude.ai provider initialized");
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: ClaudeWebClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Direct access to remote conversation management.
    pub fn client(&self) -> &ClaudeWebClient {
        &self.client
    }
}

/// The text sent to claude.ai for a request.
///
/// A single message is sent as-is. Longer transcripts are flattened into
/// labelled turns so the fresh remote conversation sees the history.
fn build_prompt(request: &ChatRequest) -> String {
    if let [only] = request.messages.as_slice() {
        return only.content.clone();
    }
    request
        .messages
        .iter()
        .map(|m| {
            let label = match m.role {
                Role::System => "System",
                Role::User => "Human",
                Role::Assistant => "Assistant",
            };
            format!("{label}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn conversation_name(prompt: &str) -> String {
    prompt.chars().take(CONVERSATION_NAME_CHARS).collect()
}

#[async_trait]
impl PluginAdapter for ClaudeWebProvider {
    fn name(&self) -> &str {
        "claude-web"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, EnvoyError> {
        match self.client.organization_id().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), EnvoyError> {
        debug!("claude.ai provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeWebProvider {
    async fn list_models(&self) -> Result<Vec<String>, EnvoyError> {
        Ok(vec![self.client.model().to_string()])
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EnvoyError> {
        info!(model = %request.model, is_stream = false, "chat start");
        let prompt = build_prompt(&request);
        let conversation = self
            .client
            .create_conversation(&conversation_name(&prompt))
            .await?;
        let message = self.client.append_message(&conversation.uuid, &prompt).await?;
        info!(model = %request.model, is_stream = false, "chat success");
        Ok(ChatResponse {
            id: conversation.uuid,
            model: request.model,
            content: message.completion,
            finish_reason: message.stop_reason,
            usage: None,
            created: chrono::Utc::now(),
        })
    }

    fn stream(&self, request: ChatRequest) -> ChatStream {
        info!(model = %request.model, is_stream = true, "chat start");
        let client = Arc::clone(&self.client);
        let prompt = build_prompt(&request);
        let normalizer = LineNormalizer {
            model: request.model,
        };
        aienvoy_stream::spawn(
            "claude-web",
            async move {
                let conversation = client.create_conversation(&conversation_name(&prompt)).await?;
                client.append_message_stream(&conversation.uuid, &prompt).await
            },
            normalizer,
        )
    }
}

/// Maps `data: {json}` lines to deltas.
struct LineNormalizer {
    model: String,
}

impl Normalize for LineNormalizer {
    type Frame = String;

    fn normalize(&mut self, line: String) -> Result<Normalized, EnvoyError> {
        let Some(chunk) = client::parse_line(&line)? else {
            return Ok(Normalized::Skip);
        };
        if chunk.completion.is_empty() && chunk.stop_reason.is_none() {
            return Ok(Normalized::Skip);
        }
        Ok(Normalized::Delta(StreamDelta {
            delta_text: chunk.completion,
            model: self.model.clone(),
            finish_reason: chunk.stop_reason,
            usage: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aienvoy_core::ChatMessage;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_claude(body: &'static str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/organizations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"uuid": "org-1"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/organizations/org-1/chat_conversations"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"uuid": "conv-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/append_message"))
            .and(body_partial_json(serde_json::json!({"conversation_uuid": "conv-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn provider(server: &MockServer) -> ClaudeWebProvider {
        ClaudeWebProvider::with_client(
            ClaudeWebClient::with_base_url("sk", "claude-2", "UTC", &server.uri()).unwrap(),
        )
    }

    fn request(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: "claude-2".into(),
            messages,
            ..Default::default()
        }
    }

    #[test]
    fn single_message_prompt_is_verbatim() {
        assert_eq!(build_prompt(&request(vec![ChatMessage::user("Hi")])), "Hi");
    }

    #[test]
    fn transcript_prompt_labels_turns() {
        let prompt = build_prompt(&request(vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello"),
            ChatMessage::user("How are you?"),
        ]));
        assert_eq!(prompt, "Human: Hi\n\nAssistant: Hello\n\nHuman: How are you?");
    }

    #[test]
    fn conversation_name_is_truncated_on_char_boundary() {
        let name = conversation_name(&"é".repeat(100));
        assert_eq!(name.chars().count(), CONVERSATION_NAME_CHARS);
    }

    #[tokio::test]
    async fn complete_creates_conversation_then_appends() {
        let server = mock_claude(
            "data: {\"completion\":\"Hel\"}\n\ndata: {\"completion\":\"lo\",\"stop_reason\":\"stop_sequence\"}\n",
        )
        .await;
        let response = provider(&server)
            .complete(request(vec![ChatMessage::user("Hi")]))
            .await
            .unwrap();
        assert_eq!(response.id, "conv-1");
        assert_eq!(response.content, "Hello");
        assert_eq!(response.finish_reason.as_deref(), Some("stop_sequence"));
    }

    #[tokio::test]
    async fn stream_forwards_each_line() {
        let server = mock_claude(
            "data: {\"completion\":\"A\"}\n\ndata: {\"completion\":\"B\"}\n\ndata: {\"completion\":\"C\"}",
        )
        .await;
        let collected = provider(&server)
            .stream(request(vec![ChatMessage::user("Hi")]))
            .collect()
            .await
            .unwrap();
        assert_eq!(collected.text, "ABC");
        assert_eq!(collected.deltas, 3);
        assert_eq!(collected.model, "claude-2");
    }

    #[tokio::test]
    async fn stream_malformed_line_fails_after_partial_output() {
        let server = mock_claude("data: {\"completion\":\"A\"}\ndata: nope\n").await;
        let mut stream = provider(&server).stream(request(vec![ChatMessage::user("Hi")]));
        let mut texts = Vec::new();
        let result = loop {
            match stream.next_event().await.unwrap() {
                aienvoy_core::StreamEvent::Delta(d) => texts.push(d.delta_text),
                aienvoy_core::StreamEvent::End(result) => break result,
            }
        };
        assert_eq!(texts, vec!["A"]);
        assert!(result.is_err());
    }
}
