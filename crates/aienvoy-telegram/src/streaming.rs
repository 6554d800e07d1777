// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edit-in-place message streaming with throttle for Telegram.
//!
//! The first chunk of a reply is sent as a new message, later chunks edit
//! it, at most once per throttle interval. When the text outgrows
//! [`SPLIT_THRESHOLD`] the current message is closed at a paragraph
//! boundary and the remainder continues in a new message.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, MessageId, ParseMode};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use aienvoy_core::EnvoyError;

use crate::markdown;

/// Leaves room below Telegram's 4096-char limit for escaping.
pub const SPLIT_THRESHOLD: usize = 3800;

/// Default throttle interval between message edits.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(1500);

const TYPING_INTERVAL: Duration = Duration::from_secs(5);

/// Where the editor writes. One chat.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send(
        &self,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<MessageId, EnvoyError>;

    async fn edit(
        &self,
        id: MessageId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), EnvoyError>;
}

fn channel_error(action: &str, e: teloxide::RequestError) -> EnvoyError {
    EnvoyError::Channel {
        message: format!("failed to {action} message: {e}"),
        source: Some(Box::new(e)),
    }
}

/// [`Outbox`] backed by the Bot API.
#[derive(Clone)]
pub struct BotOutbox {
    bot: Bot,
    chat_id: ChatId,
}

impl BotOutbox {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Outbox for BotOutbox {
    async fn send(
        &self,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<MessageId, EnvoyError> {
        let mut request = self.bot.send_message(self.chat_id, text);
        if let Some(mode) = parse_mode {
            request = request.parse_mode(mode);
        }
        let sent = request.await.map_err(|e| channel_error("send", e))?;
        Ok(sent.id)
    }

    async fn edit(
        &self,
        id: MessageId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), EnvoyError> {
        let mut request = self.bot.edit_message_text(self.chat_id, id, text);
        if let Some(mode) = parse_mode {
            request = request.parse_mode(mode);
        }
        match request.await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("message is not modified") => {
                debug!("message unchanged, skipping edit");
                Ok(())
            }
            Err(e) => Err(channel_error("edit", e)),
        }
    }
}

/// Accumulates streamed text and mirrors it into Telegram messages.
pub struct StreamingEditor<O> {
    outbox: O,
    message_id: Option<MessageId>,
    buffer: String,
    dirty: bool,
    last_edit: Option<Instant>,
    throttle: Duration,
    messages_sent: Vec<MessageId>,
}

impl<O: Outbox> StreamingEditor<O> {
    pub fn new(outbox: O) -> Self {
        Self::with_throttle(outbox, DEFAULT_THROTTLE)
    }

    pub fn with_throttle(outbox: O, throttle: Duration) -> Self {
        Self {
            outbox,
            message_id: None,
            buffer: String::new(),
            dirty: false,
            last_edit: None,
            throttle,
            messages_sent: Vec::new(),
        }
    }

    /// Appends a chunk, flushing when the throttle allows.
    pub async fn push_chunk(&mut self, text: &str) -> Result<(), EnvoyError> {
        if text.is_empty() {
            return Ok(());
        }
        self.buffer.push_str(text);
        self.dirty = true;

        while self.buffer.len() > SPLIT_THRESHOLD {
            let (head, tail) = split_at_paragraph_boundary(&self.buffer, SPLIT_THRESHOLD);
            let head_len = head.len();
            let tail = tail.to_string();
            self.buffer.truncate(head_len);
            self.flush().await?;
            self.close_message();
            self.dirty = !tail.is_empty();
            self.buffer = tail;
        }

        let due = self
            .last_edit
            .is_none_or(|at| at.elapsed() >= self.throttle);
        if due {
            self.flush().await?;
        }
        Ok(())
    }

    /// Delivers whatever is still buffered. Call once the stream has ended.
    pub async fn finalize(&mut self) -> Result<(), EnvoyError> {
        self.flush().await?;
        self.close_message();
        Ok(())
    }

    /// All messages this editor has completed.
    pub fn message_ids(&self) -> &[MessageId] {
        &self.messages_sent
    }

    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    fn close_message(&mut self) {
        if let Some(id) = self.message_id.take() {
            self.messages_sent.push(id);
        }
        self.buffer.clear();
        self.dirty = false;
    }

    async fn flush(&mut self) -> Result<(), EnvoyError> {
        if !self.dirty || self.buffer.is_empty() {
            return Ok(());
        }

        let escaped = markdown::escape_markdown_v2(&self.buffer);
        match self.message_id {
            None => {
                let id = match self
                    .outbox
                    .send(&escaped, Some(ParseMode::MarkdownV2))
                    .await
                {
                    Ok(id) => id,
                    Err(e) => {
                        debug!(error = %e, "MarkdownV2 send failed, retrying as plain text");
                        self.outbox.send(&self.buffer, None).await?
                    }
                };
                self.message_id = Some(id);
            }
            Some(id) => {
                if let Err(e) = self
                    .outbox
                    .edit(id, &escaped, Some(ParseMode::MarkdownV2))
                    .await
                {
                    warn!(error = %e, "MarkdownV2 edit failed, retrying as plain text");
                    self.outbox.edit(id, &self.buffer, None).await?;
                }
            }
        }

        self.dirty = false;
        self.last_edit = Some(Instant::now());
        Ok(())
    }
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Splits text at a paragraph boundary before `max_len` bytes.
///
/// Priority: double newline > single newline > space > hard split.
pub fn split_at_paragraph_boundary(text: &str, max_len: usize) -> (&str, &str) {
    if text.len() <= max_len {
        return (text, "");
    }

    let cut = floor_char_boundary(text, max_len);
    let window = &text[..cut];

    if let Some(pos) = window.rfind("\n\n").filter(|&p| p > 0) {
        return (&text[..pos], text[pos + 2..].trim_start());
    }
    if let Some(pos) = window.rfind('\n').filter(|&p| p > 0) {
        return (&text[..pos], text[pos + 1..].trim_start());
    }
    if let Some(pos) = window.rfind(' ').filter(|&p| p > 0) {
        return (&text[..pos], &text[pos + 1..]);
    }
    if cut == 0 {
        // max_len smaller than the first char; take the char anyway
        let first = text.chars().next().map_or(text.len(), char::len_utf8);
        return text.split_at(first);
    }
    text.split_at(cut)
}

/// Sends `typing` now and every few seconds until `cancel` fires.
pub fn start_typing_indicator(
    bot: Bot,
    chat_id: ChatId,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
                warn!(error = %e, "failed to send typing indicator");
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(TYPING_INTERVAL) => {}
            }
        }
        debug!("typing indicator stopped");
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// What a [`RecordingOutbox`] saw.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Send(String, bool),
        Edit(i32, String, bool),
    }

    /// In-memory [`Outbox`] that can reject MarkdownV2.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingOutbox {
        pub(crate) calls: Arc<Mutex<Vec<Call>>>,
        pub(crate) reject_markdown: bool,
    }

    impl RecordingOutbox {
        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        /// Text of each message as last written.
        pub(crate) fn final_texts(&self) -> Vec<String> {
            let mut texts: Vec<String> = Vec::new();
            for call in self.calls() {
                match call {
                    Call::Send(text, _) => texts.push(text),
                    Call::Edit(id, text, _) => texts[(id - 1) as usize] = text,
                }
            }
            texts
        }
    }

    #[async_trait]
    impl Outbox for RecordingOutbox {
        async fn send(
            &self,
            text: &str,
            parse_mode: Option<ParseMode>,
        ) -> Result<MessageId, EnvoyError> {
            if self.reject_markdown && parse_mode.is_some() {
                return Err(EnvoyError::Channel {
                    message: "can't parse entities".into(),
                    source: None,
                });
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Send(text.to_string(), parse_mode.is_some()));
            let sent = calls.iter().filter(|c| matches!(c, Call::Send(..))).count();
            Ok(MessageId(sent as i32))
        }

        async fn edit(
            &self,
            id: MessageId,
            text: &str,
            parse_mode: Option<ParseMode>,
        ) -> Result<(), EnvoyError> {
            if self.reject_markdown && parse_mode.is_some() {
                return Err(EnvoyError::Channel {
                    message: "can't parse entities".into(),
                    source: None,
                });
            }
            self.calls
                .lock()
                .unwrap()
                .push(Call::Edit(id.0, text.to_string(), parse_mode.is_some()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_chunk_sends_then_edits() {
        let outbox = RecordingOutbox::default();
        let mut editor = StreamingEditor::with_throttle(outbox.clone(), Duration::ZERO);
        editor.push_chunk("Hello").await.unwrap();
        editor.push_chunk(" world.").await.unwrap();
        editor.finalize().await.unwrap();

        assert_eq!(
            outbox.calls(),
            vec![
                Call::Send("Hello".into(), true),
                Call::Edit(1, "Hello world\\.".into(), true),
            ]
        );
        assert_eq!(editor.message_ids(), &[MessageId(1)]);
    }

    #[tokio::test]
    async fn throttle_coalesces_edits() {
        let outbox = RecordingOutbox::default();
        let mut editor = StreamingEditor::with_throttle(outbox.clone(), Duration::from_secs(60));
        for word in ["a ", "b ", "c ", "d"] {
            editor.push_chunk(word).await.unwrap();
        }
        assert_eq!(outbox.calls().len(), 1);

        editor.finalize().await.unwrap();
        assert_eq!(
            outbox.calls(),
            vec![
                Call::Send("a ".into(), true),
                Call::Edit(1, "a b c d".into(), true),
            ]
        );
    }

    #[tokio::test]
    async fn finalize_without_new_text_does_not_edit() {
        let outbox = RecordingOutbox::default();
        let mut editor = StreamingEditor::with_throttle(outbox.clone(), Duration::ZERO);
        editor.push_chunk("done").await.unwrap();
        editor.finalize().await.unwrap();
        assert_eq!(outbox.calls(), vec![Call::Send("done".into(), true)]);
    }

    #[tokio::test]
    async fn markdown_rejection_falls_back_to_plain() {
        let outbox = RecordingOutbox {
            reject_markdown: true,
            ..Default::default()
        };
        let mut editor = StreamingEditor::with_throttle(outbox.clone(), Duration::ZERO);
        editor.push_chunk("*half").await.unwrap();
        editor.push_chunk(" bold").await.unwrap();
        editor.finalize().await.unwrap();
        assert_eq!(
            outbox.calls(),
            vec![
                Call::Send("*half".into(), false),
                Call::Edit(1, "*half bold".into(), false),
            ]
        );
    }

    #[tokio::test]
    async fn long_text_splits_into_messages() {
        let outbox = RecordingOutbox::default();
        let mut editor = StreamingEditor::with_throttle(outbox.clone(), Duration::ZERO);
        let para = "x".repeat(3000);
        editor.push_chunk(&para).await.unwrap();
        editor.push_chunk("\n\n").await.unwrap();
        editor.push_chunk(&para).await.unwrap();
        editor.finalize().await.unwrap();

        assert_eq!(outbox.final_texts(), vec![para.clone(), para]);
        assert_eq!(editor.message_ids(), &[MessageId(1), MessageId(2)]);
    }

    #[test]
    fn split_at_paragraph_boundary_double_newline() {
        let text = "First paragraph.\n\nSecond paragraph that is longer.";
        let (first, rest) = split_at_paragraph_boundary(text, 30);
        assert_eq!(first, "First paragraph.");
        assert_eq!(rest, "Second paragraph that is longer.");
    }

    #[test]
    fn split_prefers_double_newline_over_single() {
        let (first, rest) = split_at_paragraph_boundary("A\nB\n\nC\nD", 6);
        assert_eq!(first, "A\nB");
        assert_eq!(rest, "C\nD");
    }

    #[test]
    fn split_at_single_newline_then_space() {
        let (first, rest) = split_at_paragraph_boundary("First line\nSecond line", 15);
        assert_eq!((first, rest), ("First line", "Second line"));
        let (first, rest) = split_at_paragraph_boundary("OneLongWordThen another", 18);
        assert_eq!((first, rest), ("OneLongWordThen", "another"));
    }

    #[test]
    fn hard_split_respects_char_boundaries() {
        let text = "你好世界你好世界";
        let (first, rest) = split_at_paragraph_boundary(text, 10);
        assert_eq!(first, "你好世");
        assert_eq!(rest, "界你好世界");
    }

    #[test]
    fn short_text_is_not_split() {
        assert_eq!(split_at_paragraph_boundary("Short", 100), ("Short", ""));
    }
}
