//! Authorization Guard
//!
//! Every room operation passes through the guard before touching the store
//! or the presence tracker.

use std::sync::Arc;

use crate::domain::{Room, RoomRepository};
use crate::shared::error::AppError;

/// Membership check against the registry's current snapshot.
pub struct RoomGuard {
    rooms: Arc<dyn RoomRepository>,
}

impl RoomGuard {
    pub fn new(rooms: Arc<dyn RoomRepository>) -> Self {
        Self { rooms }
    }

    /// Resolve the room and verify that `identity` is a participant.
    ///
    /// Unknown room ids and foreign rooms are both answered `Forbidden`, so
    /// a non-member can never distinguish "no such room" from "not yours".
    /// Returns the membership snapshot so callers can reuse it (e.g. the
    /// archived flag) without a second lookup.
    pub async fn check_membership(&self, identity: &str, room_id: i64) -> Result<Room, AppError> {
        match self.rooms.find_by_id(room_id).await? {
            Some(room) if room.is_participant(identity) => Ok(room),
            _ => Err(AppError::Forbidden("Not a participant of this room".into())),
        }
    }
}
