// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation and chat operations shared by every surface.

use std::sync::Arc;

use aienvoy_core::types::timestamp_now;
use aienvoy_core::{
    Caller, ChatMessage, ChatRequest, ChatResponse, ChatStream, Conversation, EmbeddingRequest,
    EmbeddingResponse, EnvoyError, Message, ModelUsage, ProviderAdapter, Role, StorageAdapter,
    TokenUsage,
};
use aienvoy_usage::UsageRecorder;
use tracing::{debug, info, warn};

use crate::registry::{ModelEntry, ProviderRegistry};
use crate::relay::relay;

const DEFAULT_CONVERSATION_NAME: &str = "New Conversation";

fn not_found(kind: &'static str, id: &str) -> EnvoyError {
    EnvoyError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn require_messages(request: &ChatRequest) -> Result<(), EnvoyError> {
    if request.messages.is_empty() {
        return Err(EnvoyError::InvalidRequest("messages must not be empty".into()));
    }
    Ok(())
}

/// What has to be persisted once the answer to a conversation turn is known.
struct Turn {
    conversation_id: String,
    model: String,
    /// Messages the caller sent in this turn.
    new_messages: Vec<ChatMessage>,
    /// Tokens in the full transcript sent upstream.
    prompt_tokens: u32,
}

/// Conversation CRUD plus stateful and stateless chat.
///
/// Cheap to clone; streaming operations hand a clone to their relay task.
#[derive(Clone)]
pub struct ConversationService {
    registry: Arc<ProviderRegistry>,
    storage: Arc<dyn StorageAdapter>,
    usage: UsageRecorder,
}

impl ConversationService {
    pub fn new(registry: Arc<ProviderRegistry>, storage: Arc<dyn StorageAdapter>) -> Self {
        let usage = UsageRecorder::new(Arc::clone(&storage));
        Self::with_usage_recorder(registry, storage, usage)
    }

    pub fn with_usage_recorder(
        registry: Arc<ProviderRegistry>,
        storage: Arc<dyn StorageAdapter>,
        usage: UsageRecorder,
    ) -> Self {
        Self {
            registry,
            storage,
            usage,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    // --- Conversations ---

    /// Creates a conversation bound to `model`, which must be routable.
    pub async fn create_conversation(
        &self,
        caller: &Caller,
        name: &str,
        model: &str,
    ) -> Result<Conversation, EnvoyError> {
        self.registry.resolve(model)?;
        let now = timestamp_now();
        let name = name.trim();
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: caller.user_id.clone(),
            name: if name.is_empty() {
                DEFAULT_CONVERSATION_NAME.to_string()
            } else {
                name.to_string()
            },
            model: model.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.storage.create_conversation(&conversation).await?;
        info!(conversation_id = %conversation.id, model, user_id = %caller.user_id, "conversation created");
        Ok(conversation)
    }

    /// The caller's conversation called `name`, created with `model` if absent.
    pub async fn conversation_named(
        &self,
        caller: &Caller,
        name: &str,
        model: &str,
    ) -> Result<Conversation, EnvoyError> {
        match self
            .storage
            .find_conversation_by_name(&caller.user_id, name)
            .await?
        {
            Some(conversation) => Ok(conversation),
            None => self.create_conversation(caller, name, model).await,
        }
    }

    /// The caller's conversations, most recently updated first.
    pub async fn list_conversations(&self, caller: &Caller) -> Result<Vec<Conversation>, EnvoyError> {
        self.storage.list_conversations(Some(&caller.user_id)).await
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Conversation, EnvoyError> {
        self.storage
            .get_conversation(id)
            .await?
            .ok_or_else(|| not_found("conversation", id))
    }

    /// Deletes a conversation together with its messages.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), EnvoyError> {
        if !self.storage.delete_conversation(id).await? {
            return Err(not_found("conversation", id));
        }
        info!(conversation_id = id, "conversation deleted");
        Ok(())
    }

    // --- Messages ---

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, EnvoyError> {
        let conversation = self.get_conversation(conversation_id).await?;
        self.storage.list_messages(&conversation.id).await
    }

    pub async fn get_message(&self, id: &str) -> Result<Message, EnvoyError> {
        self.storage
            .get_message(id)
            .await?
            .ok_or_else(|| not_found("message", id))
    }

    pub async fn delete_message(&self, id: &str) -> Result<(), EnvoyError> {
        if !self.storage.delete_message(id).await? {
            return Err(not_found("message", id));
        }
        Ok(())
    }

    /// Resolves the provider and builds the upstream request for one turn:
    /// stored history followed by the messages in `request`.
    ///
    /// An empty `request.model` means the conversation's model.
    async fn prepare_turn(
        &self,
        conversation_id: &str,
        request: ChatRequest,
        stream: bool,
    ) -> Result<(Arc<dyn ProviderAdapter>, ChatRequest, Turn), EnvoyError> {
        require_messages(&request)?;
        let conversation = self.get_conversation(conversation_id).await?;
        let model = if request.model.is_empty() {
            conversation.model.clone()
        } else {
            request.model.clone()
        };
        let provider = self.registry.resolve(&model)?;

        let history = self.storage.list_messages(&conversation.id).await?;
        let mut transcript: Vec<ChatMessage> = history.iter().map(ChatMessage::from).collect();
        transcript.extend(request.messages.iter().cloned());
        let prompt_tokens = self.usage.counter().count_messages(&model, &transcript)?;
        debug!(
            conversation_id = %conversation.id,
            history = history.len(),
            prompt_tokens,
            "conversation turn prepared"
        );

        let turn = Turn {
            conversation_id: conversation.id,
            model: model.clone(),
            new_messages: request.messages.clone(),
            prompt_tokens,
        };
        let upstream = ChatRequest {
            model,
            messages: transcript,
            stream,
            ..request
        };
        Ok((provider, upstream, turn))
    }

    /// Stores the turn's messages and the answer in one write, then records usage.
    async fn complete_turn(
        &self,
        caller: &Caller,
        turn: Turn,
        answer: &str,
        reported: Option<TokenUsage>,
    ) -> Result<Message, EnvoyError> {
        let counter = self.usage.counter();
        let mut messages = Vec::with_capacity(turn.new_messages.len() + 1);
        for chat in &turn.new_messages {
            messages.push(Message {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: turn.conversation_id.clone(),
                role: chat.role,
                content: chat.content.clone(),
                model: turn.model.clone(),
                token_count: counter.count_text(&turn.model, &chat.content)?,
                created_at: timestamp_now(),
            });
        }

        let completion_tokens = counter.count_text(&turn.model, answer)?;
        let reply = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: turn.conversation_id.clone(),
            role: Role::Assistant,
            content: answer.to_string(),
            model: turn.model.clone(),
            token_count: completion_tokens,
            created_at: timestamp_now(),
        };
        messages.push(reply.clone());
        self.storage
            .insert_turn(&turn.conversation_id, &messages)
            .await?;

        let tokens = total_tokens(turn.prompt_tokens, completion_tokens, reported);
        self.record_usage(caller, &turn.model, tokens).await;
        Ok(reply)
    }

    /// Usage is best effort: a failed write never fails the chat.
    async fn record_usage(&self, caller: &Caller, model: &str, tokens: u32) {
        if let Err(e) = self.usage.record(caller, model, tokens).await {
            warn!(error = %e, model, user_id = %caller.user_id, tokens, "token usage not recorded");
        }
    }

    /// Sends the next turn of a conversation and stores the exchange.
    ///
    /// Nothing is persisted when the provider fails.
    pub async fn create_message(
        &self,
        caller: &Caller,
        conversation_id: &str,
        request: ChatRequest,
    ) -> Result<Message, EnvoyError> {
        let (provider, upstream, turn) = self.prepare_turn(conversation_id, request, false).await?;
        let response = provider.complete(upstream).await?;
        self.complete_turn(caller, turn, &response.content, response.usage)
            .await
    }

    /// Streaming form of [`create_message`](Self::create_message).
    ///
    /// The exchange is persisted after the provider's EOF and before the
    /// returned stream reports EOF.
    pub fn create_message_stream(
        &self,
        caller: Caller,
        conversation_id: String,
        request: ChatRequest,
    ) -> ChatStream {
        let service = self.clone();
        relay(
            async move {
                let (provider, upstream, turn) =
                    service.prepare_turn(&conversation_id, request, true).await?;
                Ok((provider.stream(upstream), (service, caller, turn)))
            },
            |(service, caller, turn), collected| async move {
                service
                    .complete_turn(&caller, turn, &collected.text, collected.usage)
                    .await
                    .map(|_| ())
            },
        )
    }

    // --- Stateless chat ---

    /// One-shot chat completion with usage recording.
    pub async fn create_chat_completion(
        &self,
        caller: &Caller,
        request: ChatRequest,
    ) -> Result<ChatResponse, EnvoyError> {
        require_messages(&request)?;
        let provider = self.registry.resolve(&request.model)?;
        let counter = self.usage.counter();
        let prompt_tokens = counter.count_messages(&request.model, &request.messages)?;
        let response = provider.complete(request).await?;
        let completion_tokens = counter.count_text(&response.model, &response.content)?;
        self.record_usage(
            caller,
            &response.model,
            total_tokens(prompt_tokens, completion_tokens, response.usage),
        )
        .await;
        Ok(response)
    }

    /// Streaming one-shot chat. Usage is recorded before EOF is forwarded.
    pub fn create_chat_completion_stream(&self, caller: Caller, request: ChatRequest) -> ChatStream {
        let service = self.clone();
        relay(
            async move {
                require_messages(&request)?;
                let provider = service.registry.resolve(&request.model)?;
                let prompt_tokens = service
                    .usage
                    .counter()
                    .count_messages(&request.model, &request.messages)?;
                let model = request.model.clone();
                let upstream = ChatRequest {
                    stream: true,
                    ..request
                };
                Ok((provider.stream(upstream), (service, caller, model, prompt_tokens)))
            },
            |(service, caller, model, prompt_tokens), collected| async move {
                let completion_tokens = service.usage.counter().count_text(&model, &collected.text)?;
                let tokens = total_tokens(prompt_tokens, completion_tokens, collected.usage);
                service.record_usage(&caller, &model, tokens).await;
                Ok(())
            },
        )
    }

    // --- Embeddings ---

    /// Embeds every input with the provider serving `request.model`.
    pub async fn create_embeddings(
        &self,
        caller: &Caller,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, EnvoyError> {
        if request.input.is_empty() {
            return Err(EnvoyError::InvalidRequest("input must not be empty".into()));
        }
        let provider = self.registry.resolve(&request.model)?;
        let model = request.model.clone();
        let text = request.input.texts().join("\n");
        let response = provider.embed(request).await?;
        let tokens = match response.usage {
            Some(usage) if usage.total_tokens > 0 => usage.total_tokens,
            _ => self.usage.counter().count_text(&model, &text)?,
        };
        self.record_usage(caller, &model, tokens).await;
        Ok(response)
    }

    // --- Catalog ---

    pub fn list_models(&self) -> &[ModelEntry] {
        self.registry.models()
    }

    pub async fn usage_by_model(&self) -> Result<Vec<ModelUsage>, EnvoyError> {
        self.storage.usage_by_model().await
    }
}

/// Provider-reported totals win over local estimates.
fn total_tokens(prompt_tokens: u32, completion_tokens: u32, reported: Option<TokenUsage>) -> u32 {
    match reported {
        Some(usage) if usage.total_tokens > 0 => usage.total_tokens,
        _ => prompt_tokens.saturating_add(completion_tokens),
    }
}
