//! Message entity and repository trait.
//!
//! Maps to the `messages` table. Messages are append-only; a soft delete
//! redacts the body to a tombstone marker but keeps the row and its sequence
//! so ordering and pagination stay continuous.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Body stored in place of a soft-deleted message.
pub const TOMBSTONE_BODY: &str = "[deleted]";

/// Represents a message in a room.
///
/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - room_id: BIGINT NOT NULL REFERENCES rooms(id)
/// - sender_id: TEXT NOT NULL
/// - sequence: BIGINT NOT NULL -- strictly increasing, gap-free per room
/// - body: TEXT NOT NULL
/// - attachment_ref: TEXT NULL -- opaque reference into the attachment store
/// - edited_at: TIMESTAMPTZ NULL
/// - deleted_at: TIMESTAMPTZ NULL -- terminal once set
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Room the message belongs to
    pub room_id: i64,

    /// Sender identity
    pub sender_id: String,

    /// Per-room sequence number, assigned exactly once at creation
    pub sequence: i64,

    /// Message body; the tombstone marker once soft-deleted
    pub body: String,

    /// Opaque reference to an externally stored attachment
    pub attachment_ref: Option<String>,

    /// Timestamp when the message was last edited (None if never edited)
    pub edited_at: Option<DateTime<Utc>>,

    /// Timestamp when the message was soft-deleted (terminal state)
    pub deleted_at: Option<DateTime<Utc>>,

    /// Timestamp when the message was sent
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Check if this message has been edited.
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Check if this message is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Repository trait for Message data access operations.
///
/// `append` is the store's single write-path for new messages: it must
/// advance the owning room's sequence counter and insert the row in one
/// atomic step, so concurrent appends can never observe the same "last
/// sequence" and a failed insert can never leave a gap.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Find a message by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Atomically assign the next sequence in the room, insert the message
    /// and bump the room's activity timestamp. Returns the stored row.
    async fn append(
        &self,
        room_id: i64,
        id: i64,
        sender_id: &str,
        body: &str,
        attachment_ref: Option<&str>,
    ) -> Result<Message, AppError>;

    /// Replace the body of a message and set `edited_at`.
    async fn update_body(
        &self,
        id: i64,
        body: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<Message, AppError>;

    /// Redact a message to the tombstone marker and set `deleted_at`.
    async fn mark_deleted(&self, id: i64, deleted_at: DateTime<Utc>) -> Result<(), AppError>;

    /// Messages with `sequence > after_sequence`, ascending, capped at
    /// `limit`.
    async fn page_after(
        &self,
        room_id: i64,
        after_sequence: i64,
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// The most recent `limit` messages of a room, in ascending order.
    async fn page_latest(&self, room_id: i64, limit: i64) -> Result<Vec<Message>, AppError>;
}
