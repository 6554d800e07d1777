// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Together.xyz wire types and prompt rendering.

use aienvoy_core::{ChatRequest, Role, TokenUsage};
use serde::{Deserialize, Serialize};

/// Placeholder a model's `prompt_format` substitutes the user turn into.
const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// `POST /v1/completions` body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    pub stream_tokens: bool,
}

impl CompletionRequest {
    /// Builds the body for `request`, using `model` to shape the prompt and
    /// supply default stop sequences.
    pub fn new(request: &ChatRequest, model: Option<&ModelInfo>) -> Self {
        let config = model.map(|m| &m.config);
        let stop = if request.stop.is_empty() {
            config.map(|c| c.stop.clone()).unwrap_or_default()
        } else {
            request.stop.clone()
        };
        Self {
            model: request.model.clone(),
            prompt: render_prompt(request, config.and_then(|c| c.prompt_format.as_deref())),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop,
            stream_tokens: request.stream,
        }
    }
}

/// Renders the chat transcript into a single completion prompt.
///
/// With a `prompt_format` each user turn is substituted into the format and
/// other turns follow verbatim. Without one the transcript uses
/// `<human>:`/`<bot>:` labels and ends with an open `<bot>:` turn.
pub fn render_prompt(request: &ChatRequest, prompt_format: Option<&str>) -> String {
    match prompt_format.filter(|f| f.contains(PROMPT_PLACEHOLDER)) {
        Some(format) => request
            .messages
            .iter()
            .map(|m| match m.role {
                Role::User => format.replace(PROMPT_PLACEHOLDER, &m.content),
                Role::System | Role::Assistant => format!("{}\n", m.content),
            })
            .collect(),
        None => {
            let mut prompt = String::new();
            for m in &request.messages {
                let label = match m.role {
                    Role::Assistant => "<bot>",
                    Role::System | Role::User => "<human>",
                };
                prompt.push_str(&format!("{label}: {}\n", m.content));
            }
            prompt.push_str("<bot>:");
            prompt
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl From<ApiUsage> for TokenUsage {
    fn from(u: ApiUsage) -> Self {
        TokenUsage::new(u.prompt_tokens, u.completion_tokens)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Both the full response and every streamed chunk have this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub prompt_format: Option<String>,
    #[serde(default)]
    pub stop: Vec<String>,
}

/// One entry of `GET /models/info`. Unlisted fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: ModelConfig,
}

impl ModelInfo {
    pub fn is_chat(&self) -> bool {
        self.display_type == "chat"
    }
}

fn null_as_default<'de, D>(deserializer: D) -> Result<ModelConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<ModelConfig>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aienvoy_core::ChatMessage;

    fn chat(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: "togethercomputer/llama-2-7b-chat".into(),
            messages,
            ..Default::default()
        }
    }

    #[test]
    fn transcript_prompt_without_format() {
        let req = chat(vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello"),
            ChatMessage::user("Joke?"),
        ]);
        assert_eq!(
            render_prompt(&req, None),
            "<human>: Hi\n<bot>: Hello\n<human>: Joke?\n<bot>:"
        );
    }

    #[test]
    fn prompt_format_wraps_user_turns() {
        let req = chat(vec![ChatMessage::user("Hi")]);
        assert_eq!(
            render_prompt(&req, Some("[INST] {prompt} [/INST]")),
            "[INST] Hi [/INST]"
        );
    }

    #[test]
    fn format_without_placeholder_is_ignored() {
        let req = chat(vec![ChatMessage::user("Hi")]);
        assert_eq!(render_prompt(&req, Some("plain")), "<human>: Hi\n<bot>:");
    }

    #[test]
    fn model_stop_sequences_apply_unless_overridden() {
        let info = ModelInfo {
            name: "m".into(),
            display_type: "chat".into(),
            config: ModelConfig {
                prompt_format: None,
                stop: vec!["</s>".into()],
            },
        };
        let mut req = chat(vec![ChatMessage::user("Hi")]);
        assert_eq!(CompletionRequest::new(&req, Some(&info)).stop, vec!["</s>"]);
        req.stop = vec!["###".into()];
        assert_eq!(CompletionRequest::new(&req, Some(&info)).stop, vec!["###"]);
    }

    #[test]
    fn model_info_tolerates_null_config() {
        let info: ModelInfo = serde_json::from_str(
            r#"{"_id":"1","name":"m","display_type":"chat","config":null,"context_length":4096}"#,
        )
        .unwrap();
        assert!(info.is_chat());
        assert_eq!(info.config, ModelConfig::default());
    }
}
