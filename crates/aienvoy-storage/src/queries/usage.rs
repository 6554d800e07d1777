// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token usage records.

use aienvoy_core::EnvoyError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{ModelUsage, UsageRecord};

/// Insert one usage record.
pub async fn insert_usage(db: &Database, record: &UsageRecord) -> Result<(), EnvoyError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO llm_usages (id, user_id, api_key, model, token_usage, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![r.id, r.user_id, r.api_key, r.model, r.token_usage, r.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Total tokens and request count per model, heaviest first.
pub async fn usage_by_model(db: &Database) -> Result<Vec<ModelUsage>, EnvoyError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT model, SUM(token_usage), COUNT(*) FROM llm_usages
                 GROUP BY model ORDER BY SUM(token_usage) DESC, model ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let total: i64 = row.get(1)?;
                let requests: i64 = row.get(2)?;
                Ok(ModelUsage {
                    model: row.get(0)?,
                    total_tokens: total.max(0) as u64,
                    requests: requests.max(0) as u64,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All usage records for one user, oldest first.
pub async fn list_usage_for_user(
    db: &Database,
    user_id: &str,
) -> Result<Vec<UsageRecord>, EnvoyError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, api_key, model, token_usage, created_at FROM llm_usages
                 WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(UsageRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    api_key: row.get(2)?,
                    model: row.get(3)?,
                    token_usage: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(model: &str, tokens: u32) -> UsageRecord {
        UsageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "alice".into(),
            api_key: Some("sk-test".into()),
            model: model.into(),
            token_usage: tokens,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn aggregates_per_model() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("u.db").to_str().unwrap())
            .await
            .unwrap();

        insert_usage(&db, &record("gpt-4", 100)).await.unwrap();
        insert_usage(&db, &record("gpt-4", 50)).await.unwrap();
        insert_usage(&db, &record("claude-2", 10)).await.unwrap();

        let usage = usage_by_model(&db).await.unwrap();
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].model, "gpt-4");
        assert_eq!(usage[0].total_tokens, 150);
        assert_eq!(usage[0].requests, 2);
        assert_eq!(usage[1].model, "claude-2");

        let mine = list_usage_for_user(&db, "alice").await.unwrap();
        assert_eq!(mine.len(), 3);
        assert_eq!(mine[0].api_key.as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn empty_table_aggregates_to_nothing() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("u.db").to_str().unwrap())
            .await
            .unwrap();
        assert!(usage_by_model(&db).await.unwrap().is_empty());
    }
}
