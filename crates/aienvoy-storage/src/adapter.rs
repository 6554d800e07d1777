// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use aienvoy_config::model::StorageConfig;
use aienvoy_core::{AdapterType, EnvoyError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::models::{Conversation, Message, ModelUsage, UsageRecord};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::from(db),
        }
    }

    fn db(&self) -> Result<&Database, EnvoyError> {
        self.db.get().ok_or_else(|| EnvoyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, EnvoyError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), EnvoyError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), EnvoyError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| EnvoyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), EnvoyError> {
        self.db()?.close().await
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), EnvoyError> {
        queries::conversations::create_conversation(self.db()?, conversation).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, EnvoyError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn list_conversations(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<Conversation>, EnvoyError> {
        queries::conversations::list_conversations(self.db()?, user_id).await
    }

    async fn find_conversation_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<Conversation>, EnvoyError> {
        queries::conversations::find_conversation_by_name(self.db()?, user_id, name).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, EnvoyError> {
        queries::conversations::delete_conversation(self.db()?, id).await
    }

    async fn insert_turn(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), EnvoyError> {
        queries::messages::insert_turn(self.db()?, conversation_id, messages).await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, EnvoyError> {
        queries::messages::get_message(self.db()?, id).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, EnvoyError> {
        queries::messages::list_messages(self.db()?, conversation_id).await
    }

    async fn delete_message(&self, id: &str) -> Result<bool, EnvoyError> {
        queries::messages::delete_message(self.db()?, id).await
    }

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), EnvoyError> {
        queries::usage::insert_usage(self.db()?, record).await
    }

    async fn usage_by_model(&self) -> Result<Vec<ModelUsage>, EnvoyError> {
        queries::usage::usage_by_model(self.db()?).await
    }
}
