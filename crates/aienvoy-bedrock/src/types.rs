// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bedrock wire types for the Claude text-completion body.

use aienvoy_core::{ChatMessage, ChatRequest, Role, TokenUsage};
use serde::{Deserialize, Serialize};

/// `max_tokens_to_sample` when the request sets none.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

const HUMAN_PROMPT: &str = "\n\nHuman:";
const AI_PROMPT: &str = "\n\nAssistant:";

/// Request body for `invoke` and `invoke-with-response-stream`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BedrockRequest {
    pub prompt: String,
    pub max_tokens_to_sample: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl From<&ChatRequest> for BedrockRequest {
    fn from(r: &ChatRequest) -> Self {
        Self {
            prompt: build_prompt(&r.messages),
            max_tokens_to_sample: r.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: r.temperature,
            top_p: r.top_p,
            stop_sequences: r.stop.clone(),
        }
    }
}

/// Renders a transcript in the `Human:`/`Assistant:` form Claude's legacy
/// completion API expects, ending with an open assistant turn.
///
/// System messages are placed before the first turn without a label.
pub fn build_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        match message.role {
            Role::System => prompt.push_str(&message.content),
            Role::User => {
                prompt.push_str(HUMAN_PROMPT);
                prompt.push(' ');
                prompt.push_str(&message.content);
            }
            Role::Assistant => {
                prompt.push_str(AI_PROMPT);
                prompt.push(' ');
                prompt.push_str(&message.content);
            }
        }
    }
    prompt.push_str(AI_PROMPT);
    prompt
}

/// A Claude completion body, either a whole response or one streamed chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BedrockResponse {
    #[serde(default)]
    pub completion: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(rename = "amazon-bedrock-invocationMetrics", default)]
    pub invocation_metrics: Option<InvocationMetrics>,
}

/// Token counts Bedrock appends to the final streamed chunk.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationMetrics {
    pub input_token_count: u32,
    pub output_token_count: u32,
}

impl From<InvocationMetrics> for TokenUsage {
    fn from(m: InvocationMetrics) -> Self {
        TokenUsage::new(m.input_token_count, m.output_token_count)
    }
}

/// Payload of a `chunk` event: the completion JSON, base64 encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkPayload {
    pub bytes: String,
}

/// Payload of an `exception` or `error` message, and of error responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}
