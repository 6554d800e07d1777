// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use aienvoy_core::{
    Caller, ChatRequest, ChatResponse, Conversation, EmbeddingRequest, EmbeddingResponse,
    EnvoyError, Message, Role, TokenUsage,
};

use crate::error::ApiError;
use crate::server::GatewayState;
use crate::sse;

/// Header naming the user a request is attributed to.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Derives the caller from `X-User-Id` and the bearer token, if any.
///
/// Neither value is verified; they only attribute usage.
pub fn caller_from_headers(headers: &HeaderMap) -> Caller {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let mut caller = user_id.map(Caller::new).unwrap_or_default();

    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        caller = caller.with_api_key(token);
    }
    caller
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Response body for GET /v1/models.
#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelObject>,
}

#[derive(Debug, Serialize)]
pub struct ModelObject {
    pub id: String,
    pub object: &'static str,
    pub owned_by: String,
}

/// Response body for a non-streamed POST /v1/chat/completions.
#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Serialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletionMessage {
    pub role: Role,
    pub content: String,
}

impl From<ChatResponse> for ChatCompletionResponse {
    fn from(resp: ChatResponse) -> Self {
        Self {
            id: resp.id,
            object: "chat.completion",
            created: resp.created.timestamp(),
            model: resp.model,
            choices: vec![CompletionChoice {
                index: 0,
                message: CompletionMessage {
                    role: Role::Assistant,
                    content: resp.content,
                },
                finish_reason: resp.finish_reason,
            }],
            usage: resp.usage,
        }
    }
}

/// Request body for POST /v1/conversations.
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub name: String,
    pub model: String,
}

/// GET /health
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => ApiError(EnvoyError::NotFound {
            kind: "route",
            id: "/metrics".to_string(),
        })
        .into_response(),
    }
}

/// GET /v1/models
pub async fn list_models(State(state): State<GatewayState>) -> Json<ModelList> {
    let data = state
        .service
        .list_models()
        .iter()
        .map(|m| ModelObject {
            id: m.id.clone(),
            object: "model",
            owned_by: m.owned_by.clone(),
        })
        .collect();
    Json(ModelList {
        object: "list",
        data,
    })
}

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let caller = caller_from_headers(&headers);

    if request.stream {
        let stream = state.service.create_chat_completion_stream(caller, request);
        return Ok(sse::stream_response(stream).await);
    }

    let response = state.service.create_chat_completion(&caller, request).await?;
    Ok(Json(ChatCompletionResponse::from(response)).into_response())
}

/// POST /v1/embeddings
pub async fn create_embeddings(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let Json(request) = body?;
    let caller = caller_from_headers(&headers);
    Ok(Json(state.service.create_embeddings(&caller, request).await?))
}

/// POST /v1/conversations
pub async fn create_conversation(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let Json(request) = body?;
    let caller = caller_from_headers(&headers);
    let conversation = state
        .service
        .create_conversation(&caller, &request.name, &request.model)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /v1/conversations
pub async fn list_conversations(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let caller = caller_from_headers(&headers);
    Ok(Json(state.service.list_conversations(&caller).await?))
}

/// GET /v1/conversations/{id}
pub async fn get_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(state.service.get_conversation(&id).await?))
}

/// DELETE /v1/conversations/{id}
pub async fn delete_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_conversation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/conversations/{conversation_id}/messages
pub async fn create_message(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let caller = caller_from_headers(&headers);

    if request.stream {
        let stream = state
            .service
            .create_message_stream(caller, conversation_id, request);
        return Ok(sse::stream_response(stream).await);
    }

    let message = state
        .service
        .create_message(&caller, &conversation_id, request)
        .await?;
    Ok(Json(message).into_response())
}

/// GET /v1/conversations/{conversation_id}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.service.list_messages(&conversation_id).await?))
}

/// A message, provided it belongs to `conversation_id`.
async fn message_in(
    state: &GatewayState,
    conversation_id: &str,
    message_id: &str,
) -> Result<Message, ApiError> {
    let message = state.service.get_message(message_id).await?;
    if message.conversation_id != conversation_id {
        return Err(ApiError(EnvoyError::NotFound {
            kind: "message",
            id: message_id.to_string(),
        }));
    }
    Ok(message)
}

/// GET /v1/conversations/{conversation_id}/messages/{message_id}
pub async fn get_message(
    State(state): State<GatewayState>,
    Path((conversation_id, message_id)): Path<(String, String)>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(message_in(&state, &conversation_id, &message_id).await?))
}

/// DELETE /v1/conversations/{conversation_id}/messages/{message_id}
pub async fn delete_message(
    State(state): State<GatewayState>,
    Path((conversation_id, message_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let message = message_in(&state, &conversation_id, &message_id).await?;
    state.service.delete_message(&message.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
