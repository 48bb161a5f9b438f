//! Room event fan-out seam.
//!
//! The Message Store and Room Registry publish domain events through the
//! [`EventPublisher`] trait; the WebSocket gateway implements it and fans the
//! events out to every live session joined to the affected room. Publishing
//! is synchronous and happens inside the store's per-room serialization
//! point, so sessions observe messages in commit order.

use crate::domain::Message;

/// An event affecting a single room, addressed to its live sessions.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A new message was committed.
    MessageCreated { message: Message },

    /// A message body was edited by its sender.
    MessageEdited { message: Message },

    /// A message was soft-deleted; the row remains as a tombstone.
    MessageDeleted {
        room_id: i64,
        message_id: i64,
        sequence: i64,
    },

    /// A participant started or stopped typing. Advisory; not delivered to
    /// sessions of the typist. `ttl_secs` tells clients when to age the
    /// indicator out on their own (no expiry event is pushed).
    Typing {
        room_id: i64,
        identity: String,
        active: bool,
        ttl_secs: Option<u64>,
    },

    /// The room was archived; new sends will be rejected.
    RoomArchived { room_id: i64 },
}

impl RoomEvent {
    /// The room this event routes to.
    pub fn room_id(&self) -> i64 {
        match self {
            RoomEvent::MessageCreated { message } => message.room_id,
            RoomEvent::MessageEdited { message } => message.room_id,
            RoomEvent::MessageDeleted { room_id, .. } => *room_id,
            RoomEvent::Typing { room_id, .. } => *room_id,
            RoomEvent::RoomArchived { room_id } => *room_id,
        }
    }

    /// Identity whose own sessions should not receive the event.
    pub fn excluded_identity(&self) -> Option<&str> {
        match self {
            RoomEvent::Typing { identity, .. } => Some(identity),
            _ => None,
        }
    }
}

/// Fan-out sink for room events. Implementations must not block: the store
/// calls this while holding the room's serialization lock.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: RoomEvent);
}

/// Publisher that drops every event. Used where no gateway is attached.
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: RoomEvent) {}
}
