//! Room entity and repository trait.
//!
//! Maps to the `rooms` table. A room is a durable two-party conversation
//! between a diner and a restaurant owner; the participant set is fixed at
//! creation and at most one room exists per unordered pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a conversation room.
///
/// Maps to the `rooms` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - pair_key: TEXT NOT NULL UNIQUE -- canonical "min:max" participant pair
/// - participant_a / participant_b: TEXT NOT NULL -- sorted
/// - archived: BOOLEAN NOT NULL DEFAULT FALSE
/// - last_sequence: BIGINT NOT NULL DEFAULT 0 -- per-room message counter
/// - last_activity_at: TIMESTAMPTZ NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// The fixed participant pair, canonically sorted. Exactly two entries;
    /// immutable after creation.
    pub participant_ids: Vec<String>,

    /// Whether the room is archived. Archived rooms stay readable but
    /// reject new sends.
    pub archived: bool,

    /// Highest message sequence assigned in this room. Advanced only by the
    /// store's atomic increment; never reused.
    pub last_sequence: i64,

    /// Timestamp of the most recent append, orders room listings.
    pub last_activity_at: DateTime<Utc>,

    /// Timestamp when the room was created
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Build a new, unarchived room for a participant pair.
    pub fn new(id: i64, a: &str, b: &str, now: DateTime<Utc>) -> Self {
        let mut participants = vec![a.to_string(), b.to_string()];
        participants.sort();
        Self {
            id,
            participant_ids: participants,
            archived: false,
            last_sequence: 0,
            last_activity_at: now,
            created_at: now,
        }
    }

    /// Canonical key for an unordered two-party pair. Both argument orders
    /// produce the same key.
    pub fn pair_key_for(a: &str, b: &str) -> String {
        if a <= b {
            format!("{}:{}", a, b)
        } else {
            format!("{}:{}", b, a)
        }
    }

    /// This room's canonical pair key.
    pub fn pair_key(&self) -> String {
        Self::pair_key_for(&self.participant_ids[0], &self.participant_ids[1])
    }

    /// Check whether an identity belongs to this room.
    pub fn is_participant(&self, identity: &str) -> bool {
        self.participant_ids.iter().any(|p| p == identity)
    }

    /// The other side of the conversation, if the identity is a participant.
    pub fn counterpart_of(&self, identity: &str) -> Option<&str> {
        if !self.is_participant(identity) {
            return None;
        }
        self.participant_ids
            .iter()
            .map(String::as_str)
            .find(|p| *p != identity)
    }
}

/// Repository trait for Room data access operations.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Find a room by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError>;

    /// Find a room by its canonical pair key.
    async fn find_by_pair_key(&self, pair_key: &str) -> Result<Option<Room>, AppError>;

    /// Insert a new room. Returns `None` when a room for the same pair key
    /// already exists (creation race lost); the caller re-fetches the
    /// winner's row.
    async fn create(&self, room: &Room) -> Result<Option<Room>, AppError>;

    /// Rooms an identity participates in, ordered by most recent activity
    /// descending.
    async fn find_by_participant(&self, identity: &str) -> Result<Vec<Room>, AppError>;

    /// Mark a room archived. Idempotent.
    async fn set_archived(&self, id: i64) -> Result<(), AppError>;
}
