// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express, such
//! as per-provider required credentials and session token shapes.

use crate::diagnostic::ConfigError;
use crate::model::{AienvoyConfig, LlmType};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &AienvoyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.service.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("service.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "service.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.service.port == 0 {
        errors.push(ConfigError::validation("service.port must not be 0"));
    }

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.service.log_level
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    for (i, llm) in config.llms.iter().enumerate() {
        match llm.llm_type {
            LlmType::OpenAi | LlmType::Together => {
                if is_blank(&llm.api_key) {
                    errors.push(ConfigError::validation(format!(
                        "llms[{i}] ({}) requires api_key",
                        llm.llm_type
                    )));
                }
            }
            LlmType::AwsBedrock => {
                let creds = config.bedrock_credentials(llm);
                for (name, value) in [
                    ("region", &creds.region),
                    ("access_key_id", &creds.access_key_id),
                    ("secret_access_key", &creds.secret_access_key),
                ] {
                    if is_blank(value) {
                        errors.push(ConfigError::validation(format!(
                            "llms[{i}] (aws-bedrock) requires aws_bedrock.{name} or aws.{name}"
                        )));
                    }
                }
            }
        }

        if let Some(url) = llm.base_url.as_deref()
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            errors.push(ConfigError::validation(format!(
                "llms[{i}].base_url must be an http(s) URL, got `{url}`"
            )));
        }
    }

    if let Some(token) = config.bard.token.as_deref()
        && (token.trim().is_empty() || !token.ends_with('.'))
    {
        errors.push(ConfigError::validation(
            "bard.token must be the __Secure-1PSID cookie value, which ends with `.`",
        ));
    }

    if let Some(key) = config.claude_web.session_key.as_deref()
        && key.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "claude_web.session_key must not be empty when set",
        ));
    }

    if let Some(token) = config.telegram.bot_token.as_deref()
        && token.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "telegram.bot_token must not be empty when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AwsConfig, LlmConfig};

    fn llm(llm_type: LlmType) -> LlmConfig {
        LlmConfig {
            llm_type,
            api_key: None,
            base_url: None,
            models: Vec::new(),
            aws_bedrock: None,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&AienvoyConfig::default()).is_ok());
    }

    #[test]
    fn openai_without_key_is_rejected() {
        let mut config = AienvoyConfig::default();
        config.llms.push(llm(LlmType::OpenAi));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("llms[0] (openai) requires api_key"));
    }

    #[test]
    fn bedrock_falls_back_to_shared_aws_section() {
        let mut config = AienvoyConfig::default();
        config.aws = AwsConfig {
            region: Some("us-east-1".into()),
            access_key_id: Some("AKID".into()),
            secret_access_key: Some("secret".into()),
            session_token: None,
        };
        config.llms.push(llm(LlmType::AwsBedrock));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bedrock_reports_each_missing_credential() {
        let mut config = AienvoyConfig::default();
        let mut entry = llm(LlmType::AwsBedrock);
        entry.aws_bedrock = Some(AwsConfig {
            region: Some("us-west-2".into()),
            ..Default::default()
        });
        config.llms.push(entry);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn bard_token_must_end_with_dot() {
        let mut config = AienvoyConfig::default();
        config.bard.token = Some("abc".into());
        assert!(validate_config(&config).is_err());
        config.bard.token = Some("abc.".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = AienvoyConfig::default();
        config.service.port = 0;
        config.service.log_level = "verbose".into();
        config.storage.database_path = " ".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
