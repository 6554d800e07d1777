// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Bard web front end.

use std::sync::LazyLock;
use std::time::Duration;

use aienvoy_core::EnvoyError;
use aienvoy_stream::transport::{self, REQUEST_TIMEOUT};
use rand::Rng;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::answer::{self, Answer};

pub const DEFAULT_BASE_URL: &str = "https://bard.google.com";
const STREAM_GENERATE_PATH: &str =
    "/_/BardChatUi/data/assistant.lamda.BardFrontendService/StreamGenerate";
const TOKEN_COOKIE: &str = "__Secure-1PSID";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

static SNLM0E: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"SNlM0e":"(.*?)""#).unwrap());
static CFB2H: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"cfb2h":"(.*?)""#).unwrap());

/// Values scraped from the Bard landing page that every ask must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    /// Anti-forgery token, sent as the `at` form field.
    pub snlm0e: String,
    /// Front-end build label, sent as the `bl` query parameter.
    pub cfb2h: String,
}

impl PageMetadata {
    pub fn extract(html: &str) -> Result<Self, EnvoyError> {
        let find = |name: &str, re: &Regex| {
            re.captures(html)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| {
                    EnvoyError::provider(format!(
                        "{name} value not found in response, check the {TOKEN_COOKIE} value"
                    ))
                })
        };
        Ok(Self {
            snlm0e: find("SNlM0e", &SNLM0E)?,
            cfb2h: find("cfb2h", &CFB2H)?,
        })
    }
}

/// Where a follow-up ask continues an earlier answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Continuation {
    pub conversation_id: String,
    pub response_id: String,
    pub choice_id: String,
}

impl From<&Answer> for Continuation {
    fn from(answer: &Answer) -> Self {
        Self {
            conversation_id: answer.conversation_id.clone(),
            response_id: answer.response_id.clone(),
            choice_id: answer.choice_id().to_string(),
        }
    }
}

/// Cookie-authenticated Bard client. Page metadata is fetched on first use.
#[derive(Debug)]
pub struct BardClient {
    client: reqwest::Client,
    base_url: String,
    metadata: OnceCell<PageMetadata>,
    timeout: Duration,
}

impl BardClient {
    /// `token` is the `__Secure-1PSID` cookie value; `cookies` are sent
    /// alongside it.
    pub fn new<'a>(
        token: &str,
        cookies: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<Self, EnvoyError> {
        Self::with_base_url(token, cookies, DEFAULT_BASE_URL)
    }

    pub fn with_base_url<'a>(
        token: &str,
        cookies: impl IntoIterator<Item = (&'a String, &'a String)>,
        base_url: &str,
    ) -> Result<Self, EnvoyError> {
        if token.is_empty() || !token.ends_with('.') {
            return Err(EnvoyError::Config(format!(
                "{TOKEN_COOKIE} value must end with a single dot"
            )));
        }

        let mut cookie = format!("{TOKEN_COOKIE}={token}");
        for (name, value) in cookies {
            cookie.push_str(&format!("; {name}={value}"));
        }
        let mut cookie = HeaderValue::from_str(&cookie)
            .map_err(|e| EnvoyError::Config(format!("invalid Bard cookie value: {e}")))?;
        cookie.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);
        headers.insert("x-same-domain", HeaderValue::from_static("1"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded;charset=utf-8"),
        );
        headers.insert(ORIGIN, HeaderValue::from_static(DEFAULT_BASE_URL));
        headers.insert(REFERER, HeaderValue::from_static("https://bard.google.com/"));

        let client = transport::client_builder()
            .default_headers(headers)
            .build()
            .map_err(|e| EnvoyError::provider_from(format!("failed to build HTTP client: {e}"), e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            metadata: OnceCell::new(),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Overrides the deadline for every request, the answer included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Landing-page metadata, fetched once.
    pub async fn metadata(&self) -> Result<&PageMetadata, EnvoyError> {
        self.metadata
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(format!("{}/", self.base_url))
                    .timeout(self.timeout)
                    .send()
                    .await
                    .map_err(|e| transport::request_error("Bard request failed", e, self.timeout))?;
                let status = response.status();
                if status != reqwest::StatusCode::OK {
                    return Err(EnvoyError::provider(format!(
                        "Bard landing page returned {status}"
                    )));
                }
                let html = response.text().await.map_err(|e| {
                    transport::request_error("failed to read Bard landing page", e, self.timeout)
                })?;
                debug!("Bard page metadata fetched");
                PageMetadata::extract(&html)
            })
            .await
    }

    /// Asks `prompt`, optionally continuing an earlier answer.
    pub async fn ask(
        &self,
        prompt: &str,
        continuation: Option<&Continuation>,
    ) -> Result<Answer, EnvoyError> {
        let metadata = self.metadata().await?;
        let default = Continuation::default();
        let continuation = continuation.unwrap_or(&default);

        let request_id = 100_000 + rand::thread_rng().gen_range(0..10_000);
        let url = format!(
            "{}{STREAM_GENERATE_PATH}?bl={}&_reqid={request_id}&rt=c",
            self.base_url,
            urlencoding::encode(&metadata.cfb2h),
        );
        let body = form_body(prompt, continuation, &metadata.snlm0e);

        let response = self
            .client
            .post(url)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport::request_error("Bard request failed", e, self.timeout))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport::request_error("failed to read Bard response", e, self.timeout))?;
        if !status.is_success() {
            return Err(EnvoyError::provider(format!(
                "Bard API returned {status}: {text}"
            )));
        }
        answer::parse_body(&text)
    }
}

/// `f.req=[null, "[[prompt],null,[conv,resp,choice]]"]&at={token}`
fn form_body(prompt: &str, continuation: &Continuation, at: &str) -> String {
    let input = serde_json::json!([
        [prompt],
        null,
        [
            continuation.conversation_id,
            continuation.response_id,
            continuation.choice_id
        ]
    ]);
    let request = serde_json::json!([null, input.to_string()]);
    format!(
        "f.req={}&at={}",
        urlencoding::encode(&request.to_string()),
        urlencoding::encode(at)
    )
}
