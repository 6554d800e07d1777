// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-cookie client for the claude.ai web API.
//!
//! Calls are authenticated with the browser `sessionKey` cookie and carry the
//! header set a browser tab would send. Requests are serialized: only one is
//! in flight per client at a time.

use std::time::Duration;

use aienvoy_core::EnvoyError;
use aienvoy_stream::transport::{self, READ_TIMEOUT, REQUEST_TIMEOUT};
use aienvoy_stream::{FrameStream, lines};
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::types::{
    AppendMessageRequest, Completion, CreateConversationRequest, MessageChunk, Organization,
    RemoteConversation, RenameConversationRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://claude.ai";
pub const DEFAULT_MODEL: &str = "claude-2";
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/86.0.4240.198 Safari/537.36";

/// Client for one claude.ai session.
#[derive(Debug)]
pub struct ClaudeWebClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timezone: String,
    organization: OnceCell<String>,
    lock: Mutex<()>,
    timeout: Duration,
}

fn header(value: &str, what: &str) -> Result<HeaderValue, EnvoyError> {
    HeaderValue::from_str(value)
        .map_err(|e| EnvoyError::Config(format!("invalid {what} header value: {e}")))
}

impl ClaudeWebClient {
    pub fn new(session_key: &str, model: &str, timezone: &str) -> Result<Self, EnvoyError> {
        Self::with_base_url(session_key, model, timezone, DEFAULT_BASE_URL)
    }

    /// Like [`ClaudeWebClient::new`] against a different host.
    pub fn with_base_url(
        session_key: &str,
        model: &str,
        timezone: &str,
        base_url: &str,
    ) -> Result<Self, EnvoyError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(reqwest::header::REFERER, header(&base_url, "referer")?);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
        headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
        let mut cookie = header(&format!("sessionKey={session_key}"), "cookie")?;
        cookie.set_sensitive(true);
        headers.insert(reqwest::header::COOKIE, cookie);

        let client = transport::client_builder()
            .default_headers(headers)
            .build()
            .map_err(|e| EnvoyError::provider_from(format!("failed to build HTTP client: {e}"), e))?;

        Ok(Self {
            client,
            base_url,
            model: model.to_string(),
            timezone: timezone.to_string(),
            organization: OnceCell::new(),
            lock: Mutex::new(()),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Overrides the deadline for calls other than `append_message_stream`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends a unary request under the client deadline.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, EnvoyError> {
        self.execute(request.timeout(self.timeout), self.timeout).await
    }

    /// `limit` is the deadline reported if the request times out.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        limit: Duration,
    ) -> Result<reqwest::Response, EnvoyError> {
        let _guard = self.lock.lock().await;
        let request = request
            .build()
            .map_err(|e| EnvoyError::provider_from(format!("invalid request: {e}"), e))?;
        let target = format!("{} {}", request.method(), request.url().path());
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| transport::request_error(&format!("{target} failed"), e, limit))?;

        let status = response.status();
        debug!(%status, target = %target, "claude.ai response received");
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(EnvoyError::provider(format!("{target} returned {status}: {body}")));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, EnvoyError> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| transport::request_error("failed to parse claude.ai response", e, self.timeout))
    }

    /// `GET /api/organizations`.
    pub async fn organizations(&self) -> Result<Vec<Organization>, EnvoyError> {
        self.json(self.client.get(format!("{}/api/organizations", self.base_url)))
            .await
    }

    /// The session's organization, fetched on first use.
    pub async fn organization_id(&self) -> Result<&str, EnvoyError> {
        self.organization
            .get_or_try_init(|| async {
                let orgs = self.organizations().await?;
                let org = orgs.into_iter().next().ok_or_else(|| {
                    EnvoyError::provider("claude.ai session has no organizations")
                })?;
                info!(org = %org.uuid, name = %org.name, "claude.ai organization resolved");
                Ok::<_, EnvoyError>(org.uuid)
            })
            .await
            .map(String::as_str)
    }

    async fn conversations_url(&self) -> Result<String, EnvoyError> {
        Ok(format!(
            "{}/api/organizations/{}/chat_conversations",
            self.base_url,
            self.organization_id().await?
        ))
    }

    pub async fn list_conversations(&self) -> Result<Vec<RemoteConversation>, EnvoyError> {
        let url = self.conversations_url().await?;
        self.json(self.client.get(url)).await
    }

    pub async fn get_conversation(&self, id: &str) -> Result<RemoteConversation, EnvoyError> {
        let url = format!("{}/{id}", self.conversations_url().await?);
        self.json(self.client.get(url)).await
    }

    pub async fn create_conversation(&self, name: &str) -> Result<RemoteConversation, EnvoyError> {
        let url = self.conversations_url().await?;
        let body = CreateConversationRequest {
            name,
            uuid: uuid::Uuid::new_v4().to_string(),
        };
        let conversation: RemoteConversation = self.json(self.client.post(url).json(&body)).await?;
        debug!(conversation = %conversation.uuid, "claude.ai conversation created");
        Ok(conversation)
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<(), EnvoyError> {
        let url = format!("{}/{id}", self.conversations_url().await?);
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    /// `POST /api/rename_chat`.
    pub async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), EnvoyError> {
        let organization_uuid = self.organization_id().await?;
        let body = RenameConversationRequest {
            organization_uuid,
            conversation_uuid: id,
            title,
        };
        self.send(
            self.client
                .post(format!("{}/api/rename_chat", self.base_url))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    /// Appends `prompt` to a conversation and returns the response lines.
    pub async fn append_message_stream(
        &self,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<FrameStream<String>, EnvoyError> {
        let organization_uuid = self.organization_id().await?;
        let body = AppendMessageRequest {
            completion: Completion {
                prompt,
                timezone: &self.timezone,
                model: &self.model,
            },
            organization_uuid,
            conversation_uuid: conversation_id,
            text: prompt,
            attachments: Vec::new(),
        };
        let response = self
            .execute(
                self.client
                    .post(format!("{}/api/append_message", self.base_url))
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .json(&body),
                READ_TIMEOUT,
            )
            .await?;
        Ok(lines::lines(response.bytes_stream()))
    }

    /// Appends `prompt` and concatenates the streamed completion.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<MessageChunk, EnvoyError> {
        let mut lines = self.append_message_stream(conversation_id, prompt).await?;
        let mut message = MessageChunk::default();
        while let Some(line) = lines.try_next().await? {
            if let Some(chunk) = parse_line(&line)? {
                message.completion.push_str(&chunk.completion);
                if chunk.stop_reason.is_some() {
                    message.stop_reason = chunk.stop_reason;
                }
                if chunk.model.is_some() {
                    message.model = chunk.model;
                }
            }
        }
        Ok(message)
    }
}

/// Parses one response line. Lines without a `data:` payload yield `None`.
pub fn parse_line(line: &str) -> Result<Option<MessageChunk>, EnvoyError> {
    let Some(payload) = lines::strip_data_prefix(line) else {
        return Ok(None);
    };
    serde_json::from_str(payload)
        .map(Some)
        .map_err(|e| EnvoyError::stream_from(format!("malformed claude.ai message line: {e}"), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_org() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/organizations"))
            .and(header("cookie", "sessionKey=sk-ant-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"uuid": "org-1", "name": "Personal"}])),
            )
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn client(server: &MockServer) -> ClaudeWebClient {
        ClaudeWebClient::with_base_url("sk-ant-test", "claude-2", "UTC", &server.uri()).unwrap()
    }

    #[test]
    fn parse_line_strips_data_prefix() {
        let chunk = parse_line(r#"data: {"completion":"Hi","stop_reason":null}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.completion, "Hi");
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("event: ping").unwrap().is_none());
        assert!(parse_line("data: {broken").is_err());
    }

    #[tokio::test]
    async fn organization_is_fetched_once() {
        let server = server_with_org().await;
        Mock::given(method("GET"))
            .and(path("/api/organizations/org-1/chat_conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"uuid": "c1", "name": "first", "summary": ""}
            ])))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.organization_id().await.unwrap(), "org-1");
        let conversations = client.list_conversations().await.unwrap();
        assert_eq!(conversations[0].uuid, "c1");
    }

    #[tokio::test]
    async fn empty_organization_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/organizations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let err = client(&server).organization_id().await.unwrap_err();
        assert!(err.to_string().contains("no organizations"));
    }

    #[tokio::test]
    async fn conversation_crud() {
        let server = server_with_org().await;
        let base = "/api/organizations/org-1/chat_conversations";
        Mock::given(method("POST"))
            .and(path(base))
            .and(body_partial_json(serde_json::json!({"name": "hello"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"uuid": "c9", "name": "hello"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{base}/c9")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"uuid": "c9", "name": "hello"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{base}/c9")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/rename_chat"))
            .and(body_partial_json(serde_json::json!({
                "organization_uuid": "org-1",
                "conversation_uuid": "c9",
                "title": "renamed"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let created = client.create_conversation("hello").await.unwrap();
        assert_eq!(created.uuid, "c9");
        assert_eq!(client.get_conversation("c9").await.unwrap().name, "hello");
        client.rename_conversation("c9", "renamed").await.unwrap();
        client.delete_conversation("c9").await.unwrap();
    }

    #[tokio::test]
    async fn append_message_concatenates_lines() {
        let server = server_with_org().await;
        Mock::given(method("POST"))
            .and(path("/api/append_message"))
            .and(body_partial_json(serde_json::json!({
                "completion": {"prompt": "Hi", "timezone": "UTC", "model": "claude-2"},
                "organization_uuid": "org-1",
                "conversation_uuid": "c1",
                "text": "Hi",
                "attachments": []
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
                "data: {\"completion\":\" Hello\",\"stop_reason\":null,\"model\":\"claude-2.0\"}\n",
                "\n",
                "data: {\"completion\":\" there\",\"stop_reason\":\"stop_sequence\",\"model\":\"claude-2.0\"}\n",
            )))
            .mount(&server)
            .await;

        let message = client(&server).append_message("c1", "Hi").await.unwrap();
        assert_eq!(message.completion, " Hello there");
        assert_eq!(message.stop_reason.as_deref(), Some("stop_sequence"));
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = server_with_org().await;
        Mock::given(method("POST"))
            .and(path("/api/append_message"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server).append_message("c1", "Hi").await.unwrap_err().to_string();
        assert!(err.contains("429"), "{err}");
        assert!(err.contains("/api/append_message"), "{err}");
    }

    #[tokio::test]
    async fn slow_organization_lookup_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/organizations"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"uuid": "org-1", "name": "Personal"}]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .with_timeout(Duration::from_millis(50))
            .organization_id()
            .await
            .unwrap_err();
        assert!(matches!(err, EnvoyError::Timeout { .. }), "{err}");
    }
}
