//! WebSocket Message Types
//!
//! The gateway wire protocol: tagged JSON events in both directions,
//! `{"t": "<event>", "d": {…}}`. Snowflake ids cross the wire as strings.

use serde::{Deserialize, Serialize};

use crate::application::dto::{MessageResponse, RoomResponse};
use crate::application::events::RoomEvent;
use crate::shared::error::AppError;

/// Close codes sent when the server terminates a session.
pub mod close_codes {
    /// No inbound frame within the idle window
    pub const IDLE_TIMEOUT: u16 = 4000;
    /// Missing, malformed or expired token
    pub const UNAUTHENTICATED: u16 = 4001;
    /// Outbound queue overflowed (slow-consumer protection)
    pub const SLOW_CONSUMER: u16 = 4008;
}

/// Incoming gateway event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Must be the first frame on every connection
    Auth { token: String },
    /// Join a room; answered with an ack and a recent history page
    Join { room_id: String },
    /// Append a message; `client_msg_id` makes retries idempotent
    Send {
        room_id: String,
        body: String,
        #[serde(default)]
        attachment_ref: Option<String>,
        client_msg_id: String,
    },
    /// Edit an own message
    Edit { message_id: String, body: String },
    /// Soft-delete an own message
    Delete { message_id: String },
    TypingStart { room_id: String },
    TypingStop { room_id: String },
    /// Catch-up fetch after a reconnect, driven by the client's cursor
    Resync {
        room_id: String,
        last_seen_sequence: i64,
    },
    /// Keepalive; any frame counts against the idle window
    Ping,
}

/// Outgoing gateway event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent after successful authentication with the caller's rooms
    Ready { rooms: Vec<RoomResponse> },
    /// Join ack: room snapshot, recent page, currently typing participants
    Joined {
        room: RoomResponse,
        messages: Vec<MessageResponse>,
        has_more: bool,
        typers: Vec<String>,
    },
    /// A message was committed to a joined room
    Message { message: MessageResponse },
    /// Send ack for the requesting session, carrying the assigned sequence
    Sent {
        client_msg_id: String,
        message: MessageResponse,
    },
    MessageEdited { message: MessageResponse },
    MessageDeleted {
        room_id: String,
        message_id: String,
        sequence: i64,
    },
    /// Typing signal; `ttl_secs` tells clients when to age it out locally
    Typing {
        room_id: String,
        identity: String,
        active: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        ttl_secs: Option<u64>,
    },
    RoomArchived { room_id: String },
    /// Delta page answering a `resync`
    Resync {
        room_id: String,
        messages: Vec<MessageResponse>,
        has_more: bool,
    },
    Pong,
    /// Structured rejection of a single event; the session stays open
    Error { code: u16, message: String },
}

impl From<RoomEvent> for ServerEvent {
    fn from(event: RoomEvent) -> Self {
        match event {
            RoomEvent::MessageCreated { message } => ServerEvent::Message {
                message: message.into(),
            },
            RoomEvent::MessageEdited { message } => ServerEvent::MessageEdited {
                message: message.into(),
            },
            RoomEvent::MessageDeleted {
                room_id,
                message_id,
                sequence,
            } => ServerEvent::MessageDeleted {
                room_id: room_id.to_string(),
                message_id: message_id.to_string(),
                sequence,
            },
            RoomEvent::Typing {
                room_id,
                identity,
                active,
                ttl_secs,
            } => ServerEvent::Typing {
                room_id: room_id.to_string(),
                identity,
                active,
                ttl_secs,
            },
            RoomEvent::RoomArchived { room_id } => ServerEvent::RoomArchived {
                room_id: room_id.to_string(),
            },
        }
    }
}

impl ServerEvent {
    /// Structured rejection for an operation error.
    pub fn error(err: &AppError) -> Self {
        ServerEvent::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Parse a wire id (stringified snowflake) into its numeric form.
pub fn parse_wire_id(value: &str) -> Result<i64, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid id: {}", value)))
}
