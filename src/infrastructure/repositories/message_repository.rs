//! Message Repository Implementation
//!
//! PostgreSQL implementation of message persistence. The append path runs
//! the room-counter increment and the message insert in one transaction:
//! the `UPDATE … RETURNING` is the store's atomic increment-and-read, so no
//! two appends to one room can observe the same "last sequence" and a failed
//! insert rolls the counter back instead of leaving a gap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Message, MessageRepository, TOMBSTONE_BODY};
use crate::shared::error::AppError;

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
/// Maps to the messages table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    room_id: i64,
    sender_id: String,
    sequence: i64,
    body: String,
    attachment_ref: Option<String>,
    edited_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            sequence: self.sequence,
            body: self.body,
            attachment_ref: self.attachment_ref,
            edited_at: self.edited_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
        }
    }
}

const MESSAGE_COLUMNS: &str =
    "id, room_id, sender_id, sequence, body, attachment_ref, edited_at, deleted_at, created_at";

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn append(
        &self,
        room_id: i64,
        id: i64,
        sender_id: &str,
        body: &str,
        attachment_ref: Option<&str>,
    ) -> Result<Message, AppError> {
        let mut tx = self.pool.begin().await?;

        let sequence: i64 = sqlx::query_scalar(
            r#"
            UPDATE rooms
            SET last_sequence = last_sequence + 1, last_activity_at = NOW()
            WHERE id = $1
            RETURNING last_sequence
            "#,
        )
        .bind(room_id)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            INSERT INTO messages (id, room_id, sender_id, sequence, body, attachment_ref)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .bind(room_id)
        .bind(sender_id)
        .bind(sequence)
        .bind(body)
        .bind(attachment_ref)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into_message())
    }

    async fn update_body(
        &self,
        id: i64,
        body: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            UPDATE messages
            SET body = $2, edited_at = $3
            WHERE id = $1
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .bind(body)
        .bind(edited_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_message())
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))
    }

    /// Redact to the tombstone marker. The `deleted_at IS NULL` filter makes
    /// concurrent deletes idempotent at the storage layer too.
    async fn mark_deleted(&self, id: i64, deleted_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE messages
            SET body = $2, deleted_at = $3
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(TOMBSTONE_BODY)
        .bind(deleted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn page_after(
        &self,
        room_id: i64,
        after_sequence: i64,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {}
            FROM messages
            WHERE room_id = $1 AND sequence > $2
            ORDER BY sequence ASC
            LIMIT $3
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(room_id)
        .bind(after_sequence)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn page_latest(&self, room_id: i64, limit: i64) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {}
            FROM messages
            WHERE room_id = $1
            ORDER BY sequence DESC
            LIMIT $2
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<Message> = rows.into_iter().map(|r| r.into_message()).collect();
        messages.reverse();
        Ok(messages)
    }
}
