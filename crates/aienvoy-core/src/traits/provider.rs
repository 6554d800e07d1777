// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM provider integrations.

use async_trait::async_trait;

use crate::error::EnvoyError;
use crate::stream::ChatStream;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};

/// Adapter for LLM provider integrations.
///
/// Provider adapters translate a [`ChatRequest`] into the upstream wire
/// format, supporting both single-shot completion and streaming responses.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Model identifiers this provider serves.
    async fn list_models(&self) -> Result<Vec<String>, EnvoyError>;

    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EnvoyError>;

    /// Starts a streamed completion.
    ///
    /// Returns immediately. The upstream call runs on its own task; connection
    /// and HTTP failures arrive as the stream's terminal error.
    fn stream(&self, request: ChatRequest) -> ChatStream;

    /// Computes embedding vectors. Providers without an embeddings API keep
    /// the default, which rejects the request.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, EnvoyError> {
        Err(EnvoyError::InvalidRequest(format!(
            "model {} does not support embeddings",
            request.model
        )))
    }
}
