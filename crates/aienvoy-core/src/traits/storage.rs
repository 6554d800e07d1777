// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for conversation, message, and usage persistence.

use async_trait::async_trait;

use crate::error::EnvoyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Conversation, Message, ModelUsage, UsageRecord};

/// Adapter for persistent storage backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens connections and applies migrations.
    async fn initialize(&self) -> Result<(), EnvoyError>;

    /// Flushes and closes the backend.
    async fn close(&self) -> Result<(), EnvoyError>;

    // --- Conversations ---

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), EnvoyError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, EnvoyError>;

    /// Lists conversations, newest first, optionally restricted to one user.
    async fn list_conversations(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<Conversation>, EnvoyError>;

    /// Finds a conversation by its exact name for a user.
    async fn find_conversation_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<Conversation>, EnvoyError>;

    /// Deletes a conversation and its messages. Returns `false` if it did not exist.
    async fn delete_conversation(&self, id: &str) -> Result<bool, EnvoyError>;

    // --- Messages ---

    /// Stores one exchange and bumps the conversation's `updated_at`.
    ///
    /// All or nothing: on error no message of the turn is stored.
    async fn insert_turn(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), EnvoyError>;

    async fn get_message(&self, id: &str) -> Result<Option<Message>, EnvoyError>;

    /// Lists a conversation's messages in chronological order.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, EnvoyError>;

    /// Returns `false` if the message did not exist.
    async fn delete_message(&self, id: &str) -> Result<bool, EnvoyError>;

    // --- Usage ---

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), EnvoyError>;

    /// Total tokens and request counts per model.
    async fn usage_by_model(&self) -> Result<Vec<ModelUsage>, EnvoyError>;
}
