// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the provider registry from configuration.
//!
//! `[[llms]]` entries register in file order, followed by the Claude web
//! session and Bard when their credentials are present. A model offered by
//! several providers stays with the first one.

use std::sync::Arc;

use aienvoy_bard::BardProvider;
use aienvoy_bedrock::BedrockProvider;
use aienvoy_claudeweb::ClaudeWebProvider;
use aienvoy_config::AienvoyConfig;
use aienvoy_config::model::LlmType;
use aienvoy_core::{EnvoyError, ProviderAdapter};
use aienvoy_llm::{ModelEntry, ProviderRegistry};
use aienvoy_openai::OpenAiProvider;
use aienvoy_together::TogetherProvider;
use tracing::{info, warn};

/// Instantiates every configured provider, without registering them.
pub fn configured_providers(
    config: &AienvoyConfig,
) -> Result<Vec<Arc<dyn ProviderAdapter>>, EnvoyError> {
    let mut providers: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

    for llm in &config.llms {
        let provider: Arc<dyn ProviderAdapter> = match llm.llm_type {
            LlmType::OpenAi => Arc::new(OpenAiProvider::new(llm)?),
            LlmType::AwsBedrock => {
                Arc::new(BedrockProvider::new(llm, &config.bedrock_credentials(llm))?)
            }
            LlmType::Together => Arc::new(TogetherProvider::new(llm)?),
        };
        providers.push(provider);
    }

    if config.claude_web.session_key.is_some() {
        providers.push(Arc::new(ClaudeWebProvider::new(&config.claude_web)?));
    }
    if config.bard.token.is_some() {
        providers.push(Arc::new(BardProvider::new(&config.bard)?));
    }

    Ok(providers)
}

/// Creates and registers every configured provider.
///
/// A provider whose model listing fails is skipped with a warning.
pub async fn build_registry(config: &AienvoyConfig) -> Result<ProviderRegistry, EnvoyError> {
    let mut registry = ProviderRegistry::new();
    for provider in configured_providers(config)? {
        let name = provider.name().to_string();
        if let Err(e) = registry.register(provider).await {
            warn!(provider = %name, error = %e, "provider skipped, failed to list models");
        }
    }

    if registry.is_empty() {
        warn!("no models are routable; configure [[llms]], [claude_web] or [bard]");
    } else {
        info!(models = registry.models().len(), "provider registry ready");
    }
    Ok(registry)
}

/// Asks every configured OpenAI endpoint which models the account can use.
///
/// Unlike the registry listing this goes over the network, so it also shows
/// models that are not routable yet.
pub async fn upstream_models(config: &AienvoyConfig) -> Result<Vec<ModelEntry>, EnvoyError> {
    let mut models = Vec::new();
    for llm in config.llms.iter().filter(|l| l.llm_type == LlmType::OpenAi) {
        let listed = OpenAiProvider::new(llm)?.fetch_models().await?;
        models.extend(listed.data.into_iter().map(|m| ModelEntry {
            id: m.id,
            owned_by: m.owned_by,
        }));
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upstream_models_come_from_openai_endpoints() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("authorization", "Bearer sk-list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [
                    {"id": "gpt-4", "object": "model", "owned_by": "openai"},
                    {"id": "whisper-1", "object": "model", "owned_by": "openai-internal"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = aienvoy_config::load_and_validate_str(&format!(
            r#"
[[llms]]
type = "openai"
api_key = "sk-list"
base_url = "{}"
models = ["gpt-4"]

[[llms]]
type = "together"
api_key = "tg"
models = ["llama"]
"#,
            server.uri()
        ))
        .unwrap();

        let models = upstream_models(&config).await.unwrap();
        assert_eq!(
            models,
            vec![
                ModelEntry {
                    id: "gpt-4".into(),
                    owned_by: "openai".into()
                },
                ModelEntry {
                    id: "whisper-1".into(),
                    owned_by: "openai-internal".into()
                },
            ]
        );
    }

    #[test]
    fn empty_config_has_no_providers() {
        let providers = configured_providers(&AienvoyConfig::default()).unwrap();
        assert!(providers.is_empty());
    }

    #[tokio::test]
    async fn providers_register_in_config_order() {
        let config = aienvoy_config::load_and_validate_str(
            r#"
[[llms]]
type = "openai"
api_key = "sk-test"
models = ["gpt-4", "shared-model"]

[[llms]]
type = "aws-bedrock"
models = ["shared-model"]
[llms.aws_bedrock]
region = "us-east-1"
access_key_id = "AKID"
secret_access_key = "secret"

[claude_web]
session_key = "sk-ant-sid01-test"

[bard]
token = "g.test."
"#,
        )
        .unwrap();

        let providers = configured_providers(&config).unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["openai", "aws-bedrock", "claude-web", "bard"]);

        let registry = build_registry(&config).await.unwrap();
        assert_eq!(registry.resolve("gpt-4").unwrap().name(), "openai");
        assert_eq!(registry.resolve("shared-model").unwrap().name(), "openai");
        assert_eq!(registry.resolve("bard").unwrap().name(), "bard");
        assert_eq!(registry.resolve("claude-2").unwrap().name(), "claude-web");
    }
}
