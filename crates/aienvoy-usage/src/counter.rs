// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tiktoken-backed token estimation.

use std::sync::Arc;

use aienvoy_core::{ChatMessage, EnvoyError};
use dashmap::DashMap;
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Counts tokens with the encoding tiktoken associates with a model.
///
/// Models tiktoken does not know (Claude, Bard, Together-hosted models) fall
/// back to `cl100k_base`. Encoders are built once per model and cached.
#[derive(Clone, Default)]
pub struct TokenCounter {
    encoders: Arc<DashMap<String, Arc<CoreBPE>>>,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn encoder(&self, model: &str) -> Result<Arc<CoreBPE>, EnvoyError> {
        if let Some(bpe) = self.encoders.get(model) {
            return Ok(Arc::clone(bpe.value()));
        }

        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => {
                debug!(model, "no tiktoken encoding for model, using cl100k_base");
                tiktoken_rs::cl100k_base()
                    .map_err(|e| EnvoyError::Internal(format!("loading cl100k_base: {e}")))?
            }
        };
        let bpe = Arc::new(bpe);
        self.encoders.insert(model.to_string(), Arc::clone(&bpe));
        Ok(bpe)
    }

    /// Number of tokens in `text` under `model`'s encoding.
    pub fn count_text(&self, model: &str, text: &str) -> Result<u32, EnvoyError> {
        if text.is_empty() {
            return Ok(0);
        }
        let tokens = self.encoder(model)?.encode_with_special_tokens(text).len();
        Ok(u32::try_from(tokens).unwrap_or(u32::MAX))
    }

    /// Sum of the content tokens of every message. Role framing is not counted.
    pub fn count_messages(&self, model: &str, messages: &[ChatMessage]) -> Result<u32, EnvoyError> {
        let mut total: u32 = 0;
        for message in messages {
            total = total.saturating_add(self.count_text(model, &message.content)?);
        }
        Ok(total)
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("cached_models", &self.encoders.len())
            .finish()
    }
}
