//! Response DTOs
//!
//! Serialization shapes shared by the REST surface and the gateway events.
//! Snowflake ids cross the wire as strings; timestamps as RFC 3339.

use serde::{Deserialize, Serialize};

use crate::domain::{Message, Room};

/// A room as seen by its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    pub id: String,
    pub participant_ids: Vec<String>,
    pub archived: bool,
    /// Highest sequence committed in the room; a reconnecting client can
    /// compare this against its own cursor before asking for a resync.
    pub last_sequence: i64,
    pub last_activity_at: String,
    pub created_at: String,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            id: room.id.to_string(),
            participant_ids: room.participant_ids,
            archived: room.archived,
            last_sequence: room.last_sequence,
            last_activity_at: room.last_activity_at.to_rfc3339(),
            created_at: room.created_at.to_rfc3339(),
        }
    }
}

/// A message as delivered to clients. Tombstones keep their sequence and
/// carry the redacted body with `deleted = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sequence: i64,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<String>,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.to_string(),
            room_id: message.room_id.to_string(),
            sender_id: message.sender_id,
            sequence: message.sequence,
            deleted: message.deleted_at.is_some(),
            body: message.body,
            attachment_ref: message.attachment_ref,
            edited_at: message.edited_at.map(|t| t.to_rfc3339()),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// One page of history on the REST surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageResponse>,
    pub has_more: bool,
}
