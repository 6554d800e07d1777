// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the aienvoy configuration system.

use aienvoy_config::diagnostic::ConfigError;
use aienvoy_config::model::{AienvoyConfig, LlmType};
use aienvoy_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[service]
name = "envoy-test"
host = "0.0.0.0"
port = 9000
url = "https://envoy.example.com"
log_level = "debug"
env = "prod"

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[[llms]]
type = "openai"
api_key = "sk-123"
models = ["gpt-4"]

[[llms]]
type = "aws-bedrock"
[llms.aws_bedrock]
region = "us-east-1"
access_key_id = "AKID"
secret_access_key = "secret"

[[llms]]
type = "together"
api_key = "tg-1"
base_url = "http://localhost:9999"

[claude_web]
session_key = "sk-ant-sid01-abc"

[bard]
token = "g.a000abc."
cookies = { "__Secure-1PSIDTS" = "ts" }

[telegram]
bot_token = "123:ABC"
allowed_users = ["alice", "42"]
model = "claude-2"

[prometheus]
enabled = false
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.name, "envoy-test");
    assert_eq!(config.service.port, 9000);
    assert_eq!(config.service.url.as_deref(), Some("https://envoy.example.com"));
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.llms.len(), 3);
    assert_eq!(config.llms[0].llm_type, LlmType::OpenAi);
    assert_eq!(config.llms[0].models, vec!["gpt-4"]);
    assert_eq!(config.llms[1].llm_type, LlmType::AwsBedrock);
    assert_eq!(
        config.bedrock_credentials(&config.llms[1]).region.as_deref(),
        Some("us-east-1")
    );
    assert_eq!(config.llms[2].base_url.as_deref(), Some("http://localhost:9999"));
    assert_eq!(config.claude_web.session_key.as_deref(), Some("sk-ant-sid01-abc"));
    assert_eq!(config.claude_web.model, "claude-2");
    assert_eq!(config.bard.cookies.get("__Secure-1PSIDTS").map(String::as_str), Some("ts"));
    assert_eq!(config.telegram.allowed_users, vec!["alice", "42"]);
    assert_eq!(config.telegram.model, "claude-2");
    assert!(!config.prometheus.enabled);
}

/// Missing optional sections use defaults without error.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.service.name, "aienvoy");
    assert_eq!(config.service.host, "127.0.0.1");
    assert_eq!(config.service.port, 8090);
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.storage.database_path, "aienvoy.db");
    assert!(config.storage.wal_mode);
    assert!(config.llms.is_empty());
    assert!(config.claude_web.session_key.is_none());
    assert_eq!(config.claude_web.timezone, "Asia/Shanghai");
    assert!(config.bard.token.is_none());
    assert!(config.telegram.bot_token.is_none());
    assert!(config.prometheus.enabled);
}

/// Unknown keys are reported with a suggestion.
#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[telegram]
bot_tken = "abc"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "bot_tken");
            assert_eq!(suggestion.as_deref(), Some("bot_token"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// An unsupported `[[llms]]` type is rejected.
#[test]
fn unknown_llm_type_is_rejected() {
    let toml = r#"
[[llms]]
type = "midjourney"
api_key = "x"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown type");
    let rendered = errors[0].to_string();
    assert!(rendered.contains("type") || rendered.contains("midjourney"), "{rendered}");
}

/// Wrong value types are reported as InvalidType.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[service]
port = "eighty"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject string port");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }), "{:?}", errors[0]);
}

/// Semantic validation runs after deserialization.
#[test]
fn validation_errors_are_returned() {
    let toml = r#"
[[llms]]
type = "together"

[bard]
token = "no-trailing-dot"
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// Environment variables override file values and map onto the right sections.
#[test]
fn env_vars_override_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "envoy.toml",
            r#"
[service]
port = 7000

[telegram]
bot_token = "from-file"
"#,
        )?;
        jail.set_env("AIENVOY_TELEGRAM_BOT_TOKEN", "from-env");
        jail.set_env("AIENVOY_CLAUDE_WEB_SESSION_KEY", "sess");
        jail.set_env("AIENVOY_SERVICE_LOG_LEVEL", "warn");

        let config = load_and_validate_path(std::path::Path::new("envoy.toml"))
            .map_err(|errors| format!("{errors:?}"))?;
        assert_eq!(config.service.port, 7000);
        assert_eq!(config.service.log_level, "warn");
        assert_eq!(config.telegram.bot_token.as_deref(), Some("from-env"));
        assert_eq!(config.claude_web.session_key.as_deref(), Some("sess"));
        Ok(())
    });
}

/// A missing explicit config file is an error, unlike the XDG lookup.
#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let errors = load_and_validate_path(&dir.path().join("nope.toml")).unwrap_err();
    assert!(errors[0].to_string().contains("does not exist"));
}

/// Serialized defaults round-trip through figment.
#[test]
fn serialized_defaults_are_sensible() {
    let config = AienvoyConfig::default();
    assert_eq!(config.service.port, 8090);
    assert_eq!(config.telegram.model, "gpt-3.5-turbo");
    assert!(config.storage.wal_mode);
}
