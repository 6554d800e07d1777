// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events writer for streamed chat.
//!
//! Each delta becomes one OpenAI-style `chat.completion.chunk`:
//!
//! ```text
//! data: {"id":"chatcmpl-..","object":"chat.completion.chunk",...}
//!
//! data: [DONE]
//! ```
//!
//! The first event is awaited before any header is written. A stream that
//! fails before producing data is answered with the regular JSON error and
//! its status code; a failure after data has been sent can only be reported
//! in-band as `event: error`.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Serialize;

use aienvoy_core::{ChatStream, EnvoyError, StreamDelta, StreamEvent};

use crate::error::{ApiError, ErrorResponse};

/// One SSE `data:` payload.
#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk<'a> {
    pub id: &'a str,
    pub object: &'static str,
    pub created: i64,
    pub model: &'a str,
    pub choices: [ChunkChoice<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<aienvoy_core::TokenUsage>,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice<'a> {
    pub index: u32,
    pub delta: ChunkDelta<'a>,
    pub finish_reason: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ChunkDelta<'a> {
    pub content: &'a str,
}

/// Identity shared by every chunk of one response.
struct ChunkWriter {
    id: String,
    created: i64,
}

impl ChunkWriter {
    fn new() -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created: chrono::Utc::now().timestamp(),
        }
    }

    fn chunk<'a>(&'a self, delta: &'a StreamDelta) -> ChatCompletionChunk<'a> {
        ChatCompletionChunk {
            id: &self.id,
            object: "chat.completion.chunk",
            created: self.created,
            model: &delta.model,
            choices: [ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: &delta.delta_text,
                },
                finish_reason: delta.finish_reason.as_deref(),
            }],
            usage: delta.usage,
        }
    }

    fn event(&self, event: StreamEvent) -> Option<Event> {
        match event {
            StreamEvent::Delta(delta) => match Event::default().json_data(self.chunk(&delta)) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize stream chunk");
                    None
                }
            },
            StreamEvent::End(Ok(())) => Some(Event::default().data("[DONE]")),
            StreamEvent::End(Err(err)) => {
                tracing::warn!(error = %err, "stream failed after data was sent");
                error_event(&err)
            }
        }
    }
}

fn error_event(err: &EnvoyError) -> Option<Event> {
    let body = ErrorResponse {
        error: err.to_string(),
    };
    match Event::default().event("error").json_data(&body) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize stream error");
            None
        }
    }
}

/// Turns a [`ChatStream`] into an HTTP response.
pub async fn stream_response(mut stream: ChatStream) -> Response {
    let first = match stream.next_event().await {
        Some(StreamEvent::End(Err(err))) => return ApiError(err).into_response(),
        Some(event) => event,
        None => {
            return ApiError(EnvoyError::stream("stream ended without a terminal signal"))
                .into_response();
        }
    };

    let writer = ChunkWriter::new();
    let events = futures::stream::once(async move { first })
        .chain(stream.into_stream())
        .filter_map(move |event| futures::future::ready(writer.event(event)))
        .map(Ok::<_, Infallible>);

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}
