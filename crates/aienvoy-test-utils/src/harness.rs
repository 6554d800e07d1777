// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end testing.
//!
//! `TestHarness` wires a [`MockProvider`] into a provider registry, opens
//! SQLite in a temporary directory, and builds the [`ConversationService`]
//! on top, matching what the binary assembles at startup.

use std::sync::Arc;

use aienvoy_config::AienvoyConfig;
use aienvoy_config::model::StorageConfig;
use aienvoy_core::{Caller, ChatMessage, ChatRequest, EnvoyError, ProviderAdapter, StorageAdapter};
use aienvoy_llm::{ConversationService, ProviderRegistry};
use aienvoy_storage::SqliteStorage;

use crate::mock_provider::{MOCK_MODEL, MockProvider};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    extra_providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            extra_providers: Vec::new(),
        }
    }

    /// Set mock provider responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Register another provider after the mock one.
    pub fn with_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.extra_providers.push(provider);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, EnvoyError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| EnvoyError::Storage { source: e.into() })?;
        let storage_config = StorageConfig {
            database_path: temp_dir.path().join("test.db").display().to_string(),
            wal_mode: true,
        };
        let storage = Arc::new(SqliteStorage::new(storage_config.clone()));
        storage.initialize().await?;

        let mock_provider = Arc::new(MockProvider::with_responses(self.responses));
        let mut registry = ProviderRegistry::new();
        registry.register(mock_provider.clone()).await?;
        for provider in self.extra_providers {
            registry.register(provider).await?;
        }
        let registry = Arc::new(registry);

        let service = ConversationService::new(
            Arc::clone(&registry),
            storage.clone() as Arc<dyn StorageAdapter>,
        );

        let config = AienvoyConfig {
            storage: storage_config,
            ..AienvoyConfig::default()
        };

        Ok(TestHarness {
            mock_provider,
            storage,
            registry,
            service,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock provider and temp storage.
pub struct TestHarness {
    /// The mock LLM provider, registered for [`MOCK_MODEL`].
    pub mock_provider: Arc<MockProvider>,
    pub storage: Arc<SqliteStorage>,
    pub registry: Arc<ProviderRegistry>,
    pub service: ConversationService,
    /// Defaults, with `storage` pointing at the temporary database.
    pub config: AienvoyConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The model the mock provider serves.
    pub fn model(&self) -> &'static str {
        MOCK_MODEL
    }

    pub fn caller(&self) -> Caller {
        Caller::new("test-user")
    }

    /// A single-user-message request for the mock model.
    pub fn request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: MOCK_MODEL.to_string(),
            messages: vec![ChatMessage::user(text)],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_routes_mock_model() {
        let harness = TestHarness::builder()
            .with_mock_responses(vec!["pong".into()])
            .build()
            .await
            .unwrap();
        let response = harness
            .service
            .create_chat_completion(&harness.caller(), harness.request("ping"))
            .await
            .unwrap();
        assert_eq!(response.content, "pong");
        assert_eq!(harness.registry.models().len(), 1);
    }

    #[tokio::test]
    async fn extra_providers_are_registered() {
        let extra = Arc::new(MockProvider::named("other", vec!["other-model".into()]));
        let harness = TestHarness::builder()
            .with_provider(extra)
            .build()
            .await
            .unwrap();
        assert!(harness.registry.resolve("other-model").is_ok());
    }
}
