// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.

use aienvoy_core::EnvoyError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::models::Conversation;

const COLUMNS: &str = "id, user_id, name, model, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        model: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Create a new conversation.
pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), EnvoyError> {
    let c = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, name, model, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![c.id, c.user_id, c.name, c.model, c.created_at, c.updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by ID.
pub async fn get_conversation(db: &Database, id: &str) -> Result<Option<Conversation>, EnvoyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a user's conversation by exact name. The most recently updated wins.
pub async fn find_conversation_by_name(
    db: &Database,
    user_id: &str,
    name: &str,
) -> Result<Option<Conversation>, EnvoyError> {
    let user_id = user_id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM conversations WHERE user_id = ?1 AND name = ?2
                     ORDER BY updated_at DESC LIMIT 1"
                ),
                params![user_id, name],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List conversations, most recently updated first, optionally for one user.
pub async fn list_conversations(
    db: &Database,
    user_id: Option<&str>,
) -> Result<Vec<Conversation>, EnvoyError> {
    let user_id = user_id.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut conversations = Vec::new();
            match &user_id {
                Some(user_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM conversations WHERE user_id = ?1
                         ORDER BY updated_at DESC, rowid DESC"
                    ))?;
                    for row in stmt.query_map(params![user_id], from_row)? {
                        conversations.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM conversations ORDER BY updated_at DESC, rowid DESC"
                    ))?;
                    for row in stmt.query_map([], from_row)? {
                        conversations.push(row?);
                    }
                }
            }
            Ok(conversations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a conversation together with its messages.
///
/// Returns `false` if no conversation had that ID.
pub async fn delete_conversation(db: &Database, id: &str) -> Result<bool, EnvoyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM messages WHERE conversation_id = ?1", params![id])?;
            let deleted = tx.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn conversation(id: &str, user: &str, name: &str, ts: &str) -> Conversation {
        Conversation {
            id: id.into(),
            user_id: user.into(),
            name: name.into(),
            model: "gpt-4".into(),
            created_at: ts.into(),
            updated_at: ts.into(),
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let (db, _dir) = setup().await;
        let c = conversation("c1", "alice", "chat", "2026-01-01T00:00:00.000Z");
        create_conversation(&db, &c).await.unwrap();

        assert_eq!(get_conversation(&db, "c1").await.unwrap(), Some(c));
        assert_eq!(get_conversation(&db, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_filters_by_user_newest_first() {
        let (db, _dir) = setup().await;
        for c in [
            conversation("a", "alice", "one", "2026-01-01T00:00:00.000Z"),
            conversation("b", "alice", "two", "2026-01-02T00:00:00.000Z"),
            conversation("c", "bob", "three", "2026-01-03T00:00:00.000Z"),
        ] {
            create_conversation(&db, &c).await.unwrap();
        }

        let alice: Vec<_> = list_conversations(&db, Some("alice"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(alice, vec!["b", "a"]);
        assert_eq!(list_conversations(&db, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn find_by_name() {
        let (db, _dir) = setup().await;
        create_conversation(&db, &conversation("t1", "tg", "telegram:42", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        let found = find_conversation_by_name(&db, "tg", "telegram:42").await.unwrap();
        assert_eq!(found.map(|c| c.id).as_deref(), Some("t1"));
        assert!(find_conversation_by_name(&db, "other", "telegram:42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (db, _dir) = setup().await;
        create_conversation(&db, &conversation("d", "u", "x", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        assert!(delete_conversation(&db, "d").await.unwrap());
        assert!(!delete_conversation(&db, "d").await.unwrap());
        assert!(get_conversation(&db, "d").await.unwrap().is_none());
    }
}
