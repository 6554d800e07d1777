// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with queued replies. Every
//! request it receives is captured for later assertions.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use aienvoy_core::stream::{self, DEFAULT_CAPACITY};
use aienvoy_core::{
    AdapterType, ChatRequest, ChatResponse, ChatStream, EnvoyError, HealthStatus, PluginAdapter,
    ProviderAdapter, StreamDelta,
};

/// Default model served by [`MockProvider::new`].
pub const MOCK_MODEL: &str = "mock-model";

const DEFAULT_REPLY: &str = "mock response";

/// One scripted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Answer with this text. Streams emit it word by word.
    Text(String),
    /// Fail before producing anything.
    Error(String),
    /// Stream the text, then fail with the message. `complete` fails outright.
    PartialThenError(String, String),
}

/// A provider that replays queued replies.
///
/// When the queue is empty it answers `"mock response"`.
pub struct MockProvider {
    name: String,
    models: Vec<String>,
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// A provider named `mock` serving [`MOCK_MODEL`].
    pub fn new() -> Self {
        Self::named("mock", vec![MOCK_MODEL.to_string()])
    }

    pub fn named(name: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            name: name.into(),
            models,
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider pre-loaded with text replies.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let provider = Self::new();
        for text in responses {
            provider.push(MockReply::Text(text));
        }
        provider
    }

    pub fn push(&self, reply: MockReply) {
        lock(&self.replies).push_back(reply);
    }

    pub fn add_response(&self, text: impl Into<String>) {
        self.push(MockReply::Text(text.into()));
    }

    pub fn add_error(&self, message: impl Into<String>) {
        self.push(MockReply::Error(message.into()));
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        lock(&self.requests).last().cloned()
    }

    fn next_reply(&self, request: &ChatRequest) -> MockReply {
        lock(&self.requests).push(request.clone());
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| MockReply::Text(DEFAULT_REPLY.to_string()))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `text` into word-sized deltas, keeping the separating spaces.
fn chunks(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
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
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn list_models(&self) -> Result<Vec<String>, EnvoyError> {
        Ok(self.models.clone())
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EnvoyError> {
        match self.next_reply(&request) {
            MockReply::Text(text) => Ok(ChatResponse {
                id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
                model: request.model,
                content: text,
                finish_reason: Some("stop".to_string()),
                usage: None,
                created: chrono::Utc::now(),
            }),
            MockReply::Error(message) | MockReply::PartialThenError(_, message) => {
                Err(EnvoyError::provider(message))
            }
        }
    }

    fn stream(&self, request: ChatRequest) -> ChatStream {
        let (text, error) = match self.next_reply(&request) {
            MockReply::Text(text) => (text, None),
            MockReply::Error(message) => return ChatStream::failed(EnvoyError::provider(message)),
            MockReply::PartialThenError(text, message) => (text, Some(message)),
        };
        let model = request.model;
        let (producer, stream) = stream::channel(DEFAULT_CAPACITY);
        tokio::spawn(async move {
            let parts = chunks(&text);
            let last = parts.len().saturating_sub(1);
            for (i, part) in parts.into_iter().enumerate() {
                let mut delta = StreamDelta::text(model.clone(), part);
                if i == last && error.is_none() {
                    delta.finish_reason = Some("stop".to_string());
                }
                if !producer.send(delta).await {
                    return;
                }
            }
            match error {
                Some(message) => producer.fail(EnvoyError::provider(message)),
                None => producer.finish(),
            }
        });
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: MOCK_MODEL.into(),
            messages: vec![aienvoy_core::ChatMessage::user("hi")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn replies_in_order_then_default() {
        let provider = MockProvider::with_responses(vec!["one".into(), "two".into()]);
        assert_eq!(provider.complete(request()).await.unwrap().content, "one");
        assert_eq!(provider.complete(request()).await.unwrap().content, "two");
        assert_eq!(provider.complete(request()).await.unwrap().content, DEFAULT_REPLY);
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn stream_emits_words() {
        let provider = MockProvider::with_responses(vec!["a quick fox".into()]);
        let collected = provider.stream(request()).collect().await.unwrap();
        assert_eq!(collected.text, "a quick fox");
        assert_eq!(collected.deltas, 3);
        assert_eq!(collected.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn partial_then_error_streams_before_failing() {
        let provider = MockProvider::new();
        provider.push(MockReply::PartialThenError("half".into(), "cut".into()));
        let mut stream = provider.stream(request());
        assert!(matches!(
            stream.next_event().await,
            Some(aienvoy_core::StreamEvent::Delta(_))
        ));
        assert!(matches!(
            stream.next_event().await,
            Some(aienvoy_core::StreamEvent::End(Err(_)))
        ));
    }
}
