// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message filtering and reply streaming.
//!
//! Decides whether an incoming Telegram message is handled at all, then
//! feeds it to the chat's stored conversation and streams the answer back.

use teloxide::types::{ChatKind, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use aienvoy_core::{Caller, ChatMessage, ChatRequest, EnvoyError, StreamEvent};
use aienvoy_llm::ConversationService;

use crate::streaming::{Outbox, StreamingEditor};

/// What every handled message needs.
#[derive(Clone)]
pub struct ChatContext {
    pub service: ConversationService,
    /// Model for conversations created on a chat's first message.
    pub model: String,
}

/// Checks whether the message sender is authorized.
///
/// Matches the sender's numeric id or username (`@` optional, ASCII
/// case-insensitive). An empty list authorizes nobody.
pub fn is_authorized(msg: &Message, allowed_users: &[String]) -> bool {
    let Some(user) = msg.from.as_ref() else {
        return false;
    };
    let user_id = user.id.0.to_string();

    allowed_users.iter().any(|allowed| {
        *allowed == user_id
            || user.username.as_deref().is_some_and(|username| {
                username.eq_ignore_ascii_case(allowed.strip_prefix('@').unwrap_or(allowed))
            })
    })
}

/// Private chats only.
pub fn is_dm(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

/// Name of the stored conversation backing a chat.
pub fn conversation_name(chat_id: i64) -> String {
    format!("telegram:{chat_id}")
}

/// Usage is attributed to the Telegram user.
pub fn caller_for(msg: &Message) -> Caller {
    let id = msg
        .from
        .as_ref()
        .map(|u| u.id.0.to_string())
        .unwrap_or_else(|| msg.chat.id.0.to_string());
    Caller::new(format!("telegram:{id}"))
}

/// Answers `text` in the chat's conversation, streaming through `outbox`.
///
/// `typing` is cancelled as soon as the first delta arrives. Any failure is
/// reported to the chat as a plain message and returned.
pub async fn answer<O: Outbox>(
    ctx: &ChatContext,
    outbox: O,
    chat_id: i64,
    caller: Caller,
    text: &str,
    typing: &CancellationToken,
) -> Result<(), EnvoyError> {
    let mut editor = StreamingEditor::new(outbox);
    let result = stream_answer(ctx, &mut editor, chat_id, caller, text, typing).await;
    typing.cancel();

    if let Err(err) = &result {
        error!(chat_id, error = %err, "telegram reply failed");
        if let Err(e) = editor.outbox().send(&format!("Error: {err}"), None).await {
            error!(chat_id, error = %e, "failed to report error to chat");
        }
    }
    result
}

async fn stream_answer<O: Outbox>(
    ctx: &ChatContext,
    editor: &mut StreamingEditor<O>,
    chat_id: i64,
    caller: Caller,
    text: &str,
    typing: &CancellationToken,
) -> Result<(), EnvoyError> {
    let conversation = ctx
        .service
        .conversation_named(&caller, &conversation_name(chat_id), &ctx.model)
        .await?;

    let request = ChatRequest {
        model: conversation.model.clone(),
        messages: vec![ChatMessage::user(text)],
        stream: true,
        ..Default::default()
    };
    let mut stream = ctx
        .service
        .create_message_stream(caller, conversation.id, request);

    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Delta(delta) => {
                typing.cancel();
                editor.push_chunk(&delta.delta_text).await?;
            }
            StreamEvent::End(end) => {
                // Whatever arrived is still shown before any error.
                editor.finalize().await?;
                end?;
                debug!(chat_id, messages = editor.message_ids().len(), "telegram reply sent");
                return Ok(());
            }
        }
    }
    Err(EnvoyError::stream("reply stream ended without a terminal signal"))
}
