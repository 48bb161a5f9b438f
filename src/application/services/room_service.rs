//! Room Registry
//!
//! Owns room lifecycle and participant membership. Rooms are created lazily
//! when a caller first opens a conversation with a counterpart, never
//! hard-deleted, only archived.

use std::sync::Arc;

use chrono::Utc;

use crate::application::events::{EventPublisher, RoomEvent};
use crate::application::services::authorization::RoomGuard;
use crate::domain::{Room, RoomRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

pub struct RoomService {
    rooms: Arc<dyn RoomRepository>,
    guard: Arc<RoomGuard>,
    id_generator: Arc<SnowflakeGenerator>,
    publisher: Arc<dyn EventPublisher>,
}

impl RoomService {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        guard: Arc<RoomGuard>,
        id_generator: Arc<SnowflakeGenerator>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            rooms,
            guard,
            id_generator,
            publisher,
        }
    }

    /// Idempotent room resolution for an unordered two-party pair.
    ///
    /// Concurrent calls for the same pair converge on exactly one room:
    /// the repository insert is insert-if-absent on the canonical pair key,
    /// and a loser discards its candidate and returns the winner's row.
    pub async fn get_or_create(&self, caller: &str, counterpart: &str) -> Result<Room, AppError> {
        if caller == counterpart {
            return Err(AppError::Validation(
                "Cannot open a conversation with yourself".into(),
            ));
        }

        let pair_key = Room::pair_key_for(caller, counterpart);
        if let Some(existing) = self.rooms.find_by_pair_key(&pair_key).await? {
            return Ok(existing);
        }

        let candidate = Room::new(self.id_generator.generate(), caller, counterpart, Utc::now());
        match self.rooms.create(&candidate).await? {
            Some(created) => {
                tracing::info!(room_id = created.id, "Room created");
                Ok(created)
            }
            // Lost the creation race; the winner's row must be visible now.
            None => self
                .rooms
                .find_by_pair_key(&pair_key)
                .await?
                .ok_or_else(|| AppError::Unavailable("Room creation conflict".into())),
        }
    }

    /// Rooms an identity participates in, most recent activity first.
    pub async fn list_rooms_for(&self, identity: &str) -> Result<Vec<Room>, AppError> {
        self.rooms.find_by_participant(identity).await
    }

    /// Archive a room. Guarded; any participant may archive. Idempotent.
    /// Archived rooms remain readable but reject new sends.
    pub async fn archive(&self, room_id: i64, requester: &str) -> Result<(), AppError> {
        let room = self.guard.check_membership(requester, room_id).await?;
        if room.archived {
            return Ok(());
        }

        self.rooms.set_archived(room_id).await?;
        tracing::info!(room_id, requester, "Room archived");
        self.publisher.publish(RoomEvent::RoomArchived { room_id });
        Ok(())
    }
}
