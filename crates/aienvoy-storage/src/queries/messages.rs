// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use aienvoy_core::types::timestamp_now;
use aienvoy_core::{EnvoyError, Role};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::models::Message;

const COLUMNS: &str = "id, conversation_id, role, content, model, token_count, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        content: row.get(3)?,
        model: row.get(4)?,
        token_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Insert a turn's messages and set the conversation's `updated_at` to now,
/// in one transaction.
///
/// A failing insert rolls back the messages already written for the turn.
/// Fails when the conversation does not exist.
pub async fn insert_turn(
    db: &Database,
    conversation_id: &str,
    messages: &[Message],
) -> Result<(), EnvoyError> {
    let conversation_id = conversation_id.to_string();
    let messages = messages.to_vec();
    let now = timestamp_now();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (id, conversation_id, role, content, model, token_count, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for m in &messages {
                    stmt.execute(params![
                        m.id,
                        m.conversation_id,
                        m.role.to_string(),
                        m.content,
                        m.model,
                        m.token_count,
                        m.created_at,
                    ])?;
                }
            }
            let touched = tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![now, conversation_id],
            )?;
            if touched == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            tx.commit()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a message by ID.
pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, EnvoyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List a conversation's messages in insertion order.
pub async fn list_messages(db: &Database, conversation_id: &str) -> Result<Vec<Message>, EnvoyError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a message. Returns `false` if no message had that ID.
pub async fn delete_message(db: &Database, id: &str) -> Result<bool, EnvoyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
