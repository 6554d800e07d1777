// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON shapes used by the claude.ai web API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
}

/// A conversation as stored on claude.ai.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConversation {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateConversationRequest<'a> {
    pub name: &'a str,
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameConversationRequest<'a> {
    pub organization_uuid: &'a str,
    pub conversation_uuid: &'a str,
    pub title: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Completion<'a> {
    pub prompt: &'a str,
    pub timezone: &'a str,
    pub model: &'a str,
}

/// Body of `POST /api/append_message`.
#[derive(Debug, Clone, Serialize)]
pub struct AppendMessageRequest<'a> {
    pub completion: Completion<'a>,
    pub organization_uuid: &'a str,
    pub conversation_uuid: &'a str,
    pub text: &'a str,
    pub attachments: Vec<serde_json::Value>,
}

/// One `data:` line of the append-message response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageChunk {
    #[serde(default)]
    pub completion: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}
