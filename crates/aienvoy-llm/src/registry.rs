// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model-to-provider routing table.

use std::collections::HashMap;
use std::sync::Arc;

use aienvoy_core::{EnvoyError, ProviderAdapter};
use serde::Serialize;
use tracing::{info, warn};

/// One routable model, as listed by `GET /v1/models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub owned_by: String,
}

/// Registered providers and the models each one serves.
///
/// A model listed by more than one provider stays with the first provider
/// that registered it.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    routes: HashMap<String, usize>,
    models: Vec<ModelEntry>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("models", &self.models.len())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under every model its `list_models` reports.
    ///
    /// Returns how many models were newly routed to it.
    pub async fn register(&mut self, provider: Arc<dyn ProviderAdapter>) -> Result<usize, EnvoyError> {
        let models = provider.list_models().await?;
        Ok(self.register_models(provider, models))
    }

    /// Registers `provider` under an explicit model list.
    pub fn register_models(
        &mut self,
        provider: Arc<dyn ProviderAdapter>,
        models: impl IntoIterator<Item = String>,
    ) -> usize {
        let index = self.providers.len();
        let owner = provider.name().to_string();
        let mut added = 0;
        for model in models {
            if let Some(&existing) = self.routes.get(&model) {
                warn!(
                    model = %model,
                    provider = %owner,
                    kept = %self.providers[existing].name(),
                    "model already registered, keeping first provider"
                );
                continue;
            }
            self.routes.insert(model.clone(), index);
            self.models.push(ModelEntry {
                id: model,
                owned_by: owner.clone(),
            });
            added += 1;
        }
        info!(provider = %owner, models = added, "provider registered");
        self.providers.push(provider);
        added
    }

    /// The provider serving `model`.
    pub fn resolve(&self, model: &str) -> Result<Arc<dyn ProviderAdapter>, EnvoyError> {
        self.routes
            .get(model)
            .map(|&i| Arc::clone(&self.providers[i]))
            .ok_or_else(|| EnvoyError::UnknownModel(model.to_string()))
    }

    /// All routable models in registration order.
    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    pub fn providers(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Shuts every provider down, logging failures.
    pub async fn shutdown_all(&self) {
        for provider in &self.providers {
            if let Err(e) = provider.shutdown().await {
                warn!(provider = %provider.name(), error = %e, "provider shutdown failed");
            }
        }
    }
}
