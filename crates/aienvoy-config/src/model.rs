// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level aienvoy configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AienvoyConfig {
    /// HTTP service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// API-key based LLM providers, one `[[llms]]` table each.
    #[serde(default)]
    pub llms: Vec<LlmConfig>,

    /// Shared AWS credentials, used by Bedrock entries that carry none of their own.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Claude web session settings.
    #[serde(default)]
    pub claude_web: ClaudeWebConfig,

    /// Bard web session settings.
    #[serde(default)]
    pub bard: BardConfig,

    /// Telegram bot integration settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl AienvoyConfig {
    /// Effective Bedrock credentials for an `[[llms]]` entry: the entry's own
    /// `aws_bedrock` values, falling back field by field to `[aws]`.
    pub fn bedrock_credentials(&self, llm: &LlmConfig) -> AwsConfig {
        let own = llm.aws_bedrock.clone().unwrap_or_default();
        AwsConfig {
            region: own.region.or_else(|| self.aws.region.clone()),
            access_key_id: own.access_key_id.or_else(|| self.aws.access_key_id.clone()),
            secret_access_key: own
                .secret_access_key
                .or_else(|| self.aws.secret_access_key.clone()),
            session_token: own.session_token.or_else(|| self.aws.session_token.clone()),
        }
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service name, used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Address the HTTP gateway binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP gateway listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL, if the service sits behind a proxy.
    #[serde(default)]
    pub url: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deployment environment label (dev, prod, ...).
    #[serde(default = "default_env")]
    pub env: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            host: default_host(),
            port: default_port(),
            url: None,
            log_level: default_log_level(),
            env: default_env(),
        }
    }
}

fn default_service_name() -> String {
    "aienvoy".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_env() -> String {
    "dev".to_string()
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "aienvoy.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Kind of API-key based provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum LlmType {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "aws-bedrock")]
    AwsBedrock,
    #[serde(rename = "together")]
    Together,
}

impl LlmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmType::OpenAi => "openai",
            LlmType::AwsBedrock => "aws-bedrock",
            LlmType::Together => "together",
        }
    }
}

impl std::fmt::Display for LlmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[[llms]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    #[serde(rename = "type")]
    pub llm_type: LlmType,

    /// API key (OpenAI, Together).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Overrides the provider's default API base URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Models to serve. Empty means the provider's defaults.
    #[serde(default)]
    pub models: Vec<String>,

    /// Bedrock credentials for this entry.
    #[serde(default)]
    pub aws_bedrock: Option<AwsConfig>,
}

/// AWS credentials and region.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Temporary-credential session token.
    #[serde(default)]
    pub session_token: Option<String>,
}

/// Claude web session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClaudeWebConfig {
    /// Value of the `sessionKey` cookie. `None` disables the provider.
    #[serde(default)]
    pub session_key: Option<String>,

    /// Model name the web session reports and accepts.
    #[serde(default = "default_claude_web_model")]
    pub model: String,

    /// Timezone sent with each completion.
    #[serde(default = "default_claude_web_timezone")]
    pub timezone: String,
}

impl Default for ClaudeWebConfig {
    fn default() -> Self {
        Self {
            session_key: None,
            model: default_claude_web_model(),
            timezone: default_claude_web_timezone(),
        }
    }
}

fn default_claude_web_model() -> String {
    "claude-2".to_string()
}

fn default_claude_web_timezone() -> String {
    "Asia/Shanghai".to_string()
}

/// Bard web session configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BardConfig {
    /// Value of the `__Secure-1PSID` cookie. `None` disables the provider.
    #[serde(default)]
    pub token: Option<String>,

    /// Additional cookies sent with every request.
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` disables Telegram integration.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// List of allowed Telegram user IDs or usernames.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Model used for new Telegram conversations.
    #[serde(default = "default_telegram_model")]
    pub model: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: Vec::new(),
            model: default_telegram_model(),
        }
    }
}

fn default_telegram_model() -> String {
    "gpt-3.5-turbo".to_string()
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
