// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persists per-call token usage.

use std::sync::Arc;

use aienvoy_core::types::timestamp_now;
use aienvoy_core::{Caller, EnvoyError, StorageAdapter, UsageRecord};
use tracing::info;

use crate::counter::TokenCounter;

/// Records token usage for a caller and model.
///
/// Each [`record`](Self::record) writes exactly one `llm_usages` row and
/// bumps the `aienvoy_tokens_total{model}` counter.
#[derive(Clone)]
pub struct UsageRecorder {
    storage: Arc<dyn StorageAdapter>,
    counter: TokenCounter,
}

impl UsageRecorder {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self::with_counter(storage, TokenCounter::new())
    }

    pub fn with_counter(storage: Arc<dyn StorageAdapter>, counter: TokenCounter) -> Self {
        Self { storage, counter }
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Record an already known token count.
    pub async fn record(&self, caller: &Caller, model: &str, tokens: u32) -> Result<(), EnvoyError> {
        let record = UsageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: caller.user_id.clone(),
            api_key: caller.api_key.clone(),
            model: model.to_string(),
            token_usage: tokens,
            created_at: timestamp_now(),
        };

        self.storage.record_usage(&record).await?;

        metrics::counter!("aienvoy_tokens_total", "model" => model.to_string())
            .increment(u64::from(tokens));
        info!(token = tokens, model, user_id = %caller.user_id, "llm token usage recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aienvoy_config::model::StorageConfig;
    use aienvoy_storage::SqliteStorage;

    async fn recorder() -> (UsageRecorder, Arc<SqliteStorage>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("usage.db").display().to_string(),
            wal_mode: true,
        }));
        storage.initialize().await.unwrap();
        (UsageRecorder::new(storage.clone()), storage, dir)
    }

    #[tokio::test]
    async fn record_persists_caller_and_tokens() {
        let (recorder, storage, _dir) = recorder().await;
        let caller = Caller::new("alice").with_api_key("sk-1");

        recorder.record(&caller, "claude-2", 4).await.unwrap();
        recorder.record(&Caller::default(), "claude-2", 6).await.unwrap();

        let usage = storage.usage_by_model().await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].model, "claude-2");
        assert_eq!(usage[0].total_tokens, 10);
        assert_eq!(usage[0].requests, 2);
    }

    #[tokio::test]
    async fn storage_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("never.db").display().to_string(),
            wal_mode: true,
        }));
        let recorder = UsageRecorder::new(storage);
        assert!(recorder.record(&Caller::default(), "gpt-4", 1).await.is_err());
    }
}
