// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events framing.
//!
//! Parsing is delegated to `eventsource-stream`, which handles UTF-8
//! boundaries, multi-line `data:` fields, and comments.

use aienvoy_core::EnvoyError;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::frame::FrameStream;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name (`message` when the server sent none).
    pub event: String,
    pub data: String,
}

impl SseFrame {
    /// Whether this is the OpenAI-style `[DONE]` sentinel.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }

    /// Deserializes the `data` field.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, EnvoyError> {
        serde_json::from_str(&self.data).map_err(|e| {
            EnvoyError::stream_from(
                format!("malformed SSE data in `{}` event: {e}", self.event),
                e,
            )
        })
    }
}

/// Frames a byte stream as Server-Sent Events.
pub fn frames<S, B, E>(bytes: S) -> FrameStream<SseFrame>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    bytes
        .eventsource()
        .map(|result| match result {
            Ok(event) => Ok(SseFrame {
                event: event.event,
                data: event.data,
            }),
            Err(e) => Err(EnvoyError::stream(format!("SSE stream error: {e}"))),
        })
        .boxed()
}
